use serde::{Deserialize, Serialize};

use super::{LiveConnectConfig, Modality, ServerEvent};
use crate::audio::WireBlob;

/// First frame sent after the socket opens
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Empty>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
}

/// Serializes as `{}`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

impl SetupMessage {
    pub fn new(model: &str, config: &LiveConnectConfig) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Self {
            setup: SetupPayload {
                model,
                generation_config: GenerationConfig {
                    response_modalities: config.response_modalities.clone(),
                },
                input_audio_transcription: config.input_transcription.then(Empty::default),
                output_audio_transcription: config.output_transcription.then(Empty::default),
            },
        }
    }
}

/// Audio input frame: `{"realtimeInput": {"mediaChunks": [{"mimeType", "data"}]}}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<WireBlob>,
}

impl RealtimeInputMessage {
    pub fn audio(blob: WireBlob) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![blob],
            },
        }
    }
}

/// Message received from the realtime service
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub error: Option<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: bool,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
}

impl LiveServerMessage {
    pub fn parse(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Project the server content onto the pipeline's event shape
    pub fn into_server_event(self) -> Option<ServerEvent> {
        let content = self.server_content?;

        let audio = content.model_turn.and_then(|turn| {
            turn.parts
                .into_iter()
                .find_map(|part| part.inline_data.map(|inline| inline.data))
        });

        Some(ServerEvent {
            input_transcript: content.input_transcription.map(|t| t.text),
            output_transcript: content.output_transcription.map(|t| t.text),
            turn_complete: content.turn_complete,
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_serialization() {
        let setup = SetupMessage::new(
            "gemini-2.5-flash-native-audio-preview-09-2025",
            &LiveConnectConfig::default(),
        );
        let json = serde_json::to_value(&setup).unwrap();

        assert_eq!(
            json["setup"]["model"],
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
        assert_eq!(json["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(json["setup"]["inputAudioTranscription"], serde_json::json!({}));
        assert_eq!(json["setup"]["outputAudioTranscription"], serde_json::json!({}));
    }

    #[test]
    fn test_setup_omits_disabled_transcription() {
        let config = LiveConnectConfig {
            response_modalities: vec![Modality::Audio],
            input_transcription: false,
            output_transcription: true,
        };
        let json = serde_json::to_value(SetupMessage::new("models/m", &config)).unwrap();

        assert_eq!(json["setup"]["model"], "models/m");
        assert!(json["setup"].get("inputAudioTranscription").is_none());
    }

    #[test]
    fn test_realtime_input_serialization() {
        let msg = RealtimeInputMessage::audio(WireBlob::pcm(&[0, 0], 16000));
        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"realtimeInput":{"mediaChunks":[{"data":"AAA=","mimeType":"audio/pcm;rate=16000"}]}}"#
        );
    }

    #[test]
    fn test_setup_complete() {
        let msg = LiveServerMessage::parse(br#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.into_server_event().is_none());
    }

    #[test]
    fn test_server_content_projection() {
        let json = br#"{
            "serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}}]},
                "outputTranscription": {"text": "hi"},
                "turnComplete": true
            }
        }"#;

        let event = LiveServerMessage::parse(json).unwrap().into_server_event().unwrap();
        assert_eq!(event.audio.as_deref(), Some("AAAA"));
        assert_eq!(event.output_transcript.as_deref(), Some("hi"));
        assert_eq!(event.input_transcript, None);
        assert!(event.turn_complete);
    }

    #[test]
    fn test_input_transcription_only() {
        let json = br#"{"serverContent": {"inputTranscription": {"text": "hello"}}}"#;

        let event = LiveServerMessage::parse(json).unwrap().into_server_event().unwrap();
        assert_eq!(event.input_transcript.as_deref(), Some("hello"));
        assert!(!event.turn_complete);
        assert!(event.audio.is_none());
    }

    #[test]
    fn test_server_error() {
        let msg = LiveServerMessage::parse(br#"{"error": {"message": "quota exceeded"}}"#).unwrap();
        assert_eq!(msg.error.unwrap().message, "quota exceeded");
    }
}
