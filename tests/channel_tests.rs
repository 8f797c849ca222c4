// Integration tests for the Gemini Live connector
//
// A local WebSocket server plays the realtime service so the connector's
// handshake, audio upload and message demultiplexing run end to end.

use futures::{SinkExt, StreamExt};
use nexzi_chat::audio::CaptureEncoder;
use nexzi_chat::channel::{
    ChannelEvent, ChannelHandle, GeminiLiveConnector, LiveConnectConfig, RealtimeConnector,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Accept one connection, record what the client sends and reply with `script`
async fn serve_once(script: Vec<Message>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Setup arrives first
        if let Some(Ok(Message::Text(setup))) = ws.next().await {
            let _ = seen_tx.send(setup.as_str().to_string());
        }

        for message in script {
            ws.send(message).await.unwrap();
        }

        // Keep reading after a close frame so the reply gets flushed
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = seen_tx.send(text.as_str().to_string());
            }
        }
    });

    (url, seen_rx)
}

async fn next_event(handle: &mut ChannelHandle) -> ChannelEvent {
    tokio::time::timeout(WAIT, handle.events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("event stream ended")
}

async fn next_seen(seen: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
    let text = tokio::time::timeout(WAIT, seen.recv())
        .await
        .expect("timed out waiting for client message")
        .expect("server stopped");
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_session_round_trip() {
    let (url, mut seen) = serve_once(vec![
        Message::Text(r#"{"setupComplete": {}}"#.into()),
        Message::Text(r#"{"serverContent": {"inputTranscription": {"text": "hello"}}}"#.into()),
        // Control messages may arrive as binary frames
        Message::Binary(
            br#"{"serverContent": {"outputTranscription": {"text": "hi there"}, "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}}]}}}"#
                .to_vec()
                .into(),
        ),
        Message::Text(r#"{"serverContent": {"turnComplete": true}}"#.into()),
    ])
    .await;

    let connector = GeminiLiveConnector::with_url(url, "test-key");
    let mut handle = connector
        .connect("gemini-live-test", &LiveConnectConfig::default())
        .await
        .unwrap();

    let setup = next_seen(&mut seen).await;
    assert_eq!(setup["setup"]["model"], "models/gemini-live-test");
    assert_eq!(setup["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");

    assert_eq!(next_event(&mut handle).await, ChannelEvent::Open);

    let ChannelEvent::Message(input) = next_event(&mut handle).await else {
        panic!("expected input transcript");
    };
    assert_eq!(input.input_transcript.as_deref(), Some("hello"));

    let ChannelEvent::Message(output) = next_event(&mut handle).await else {
        panic!("expected output transcript");
    };
    assert_eq!(output.output_transcript.as_deref(), Some("hi there"));
    assert_eq!(output.audio.as_deref(), Some("AAAA"));

    let ChannelEvent::Message(done) = next_event(&mut handle).await else {
        panic!("expected turn complete");
    };
    assert!(done.turn_complete);

    handle
        .channel
        .send_realtime_input(CaptureEncoder::default().encode(&[0.0, 0.0]));
    let audio = next_seen(&mut seen).await;
    assert_eq!(
        audio["realtimeInput"]["mediaChunks"][0]["mimeType"],
        "audio/pcm;rate=16000"
    );
    assert_eq!(audio["realtimeInput"]["mediaChunks"][0]["data"], "AAAAAA==");

    handle.channel.close();
    handle.channel.close();
    assert_eq!(next_event(&mut handle).await, ChannelEvent::Closed);
}

#[tokio::test]
async fn test_server_error_surfaces() {
    let (url, _seen) = serve_once(vec![
        Message::Text(r#"{"setupComplete": {}}"#.into()),
        Message::Text(r#"{"error": {"message": "quota exceeded"}}"#.into()),
    ])
    .await;

    let connector = GeminiLiveConnector::with_url(url, "test-key");
    let mut handle = connector
        .connect("m", &LiveConnectConfig::default())
        .await
        .unwrap();

    assert_eq!(next_event(&mut handle).await, ChannelEvent::Open);
    match next_event(&mut handle).await {
        ChannelEvent::Error(message) => assert!(message.contains("quota exceeded")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_service_reports_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let connector = GeminiLiveConnector::with_url(url, "test-key");
    let mut handle = connector
        .connect("m", &LiveConnectConfig::default())
        .await
        .unwrap();

    assert!(matches!(next_event(&mut handle).await, ChannelEvent::Error(_)));
}

#[tokio::test]
async fn test_missing_api_key() {
    let connector = GeminiLiveConnector::with_url("ws://127.0.0.1:9", "");
    assert!(connector
        .connect("m", &LiveConnectConfig::default())
        .await
        .is_err());
}
