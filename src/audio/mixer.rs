// Timeline mixer for rendering scheduled playback
//
// Each placement is a decoded buffer positioned at a sample offset on the
// output timeline, optionally cut short when its source was stopped.
// Overlapping placements are summed and clipped to [-1, 1].

use std::sync::Arc;
use tracing::debug;

use super::decoder::AudioBuffer;

/// A buffer positioned on the output timeline
#[derive(Debug, Clone)]
pub struct Placement {
    /// Start offset in frames from the timeline origin
    pub start_frame: usize,
    pub buffer: Arc<AudioBuffer>,
    /// Frame offset (absolute) at which the source was stopped
    pub stop_frame: Option<usize>,
}

impl Placement {
    /// Absolute frame where this placement stops contributing
    pub fn end_frame(&self) -> usize {
        let natural_end = self.start_frame + self.buffer.frames();
        match self.stop_frame {
            Some(stop) => natural_end.min(stop.max(self.start_frame)),
            None => natural_end,
        }
    }
}

/// Mono timeline mixer
#[derive(Debug, Clone)]
pub struct TimelineMixer {
    sample_rate: u32,
}

impl TimelineMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Mix all placements into one mono timeline
    pub fn render(&self, placements: &[Placement]) -> Vec<f32> {
        let length = placements.iter().map(Placement::end_frame).max().unwrap_or(0);
        let mut timeline = vec![0.0f32; length];

        for placement in placements {
            let channels = placement.buffer.channels.max(1) as usize;
            let end = placement.end_frame();

            for (frame_index, frame) in placement
                .buffer
                .samples
                .chunks_exact(channels)
                .enumerate()
            {
                let position = placement.start_frame + frame_index;
                if position >= end {
                    break;
                }
                // Downmix multi-channel sources
                let value = frame.iter().sum::<f32>() / channels as f32;
                timeline[position] += value;
            }
        }

        for sample in &mut timeline {
            *sample = sample.clamp(-1.0, 1.0);
        }

        debug!(
            "Rendered {} placements into {} frames ({:.2}s)",
            placements.len(),
            timeline.len(),
            timeline.len() as f64 / self.sample_rate.max(1) as f64
        );

        timeline
    }
}
