use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nexzi_chat::chat::{ChatService, GeminiClient, HistoryStore, Model, ModelRouter};
use nexzi_chat::session::{DeferredCommit, PerTurnCommit, SessionState, TurnSink, VoiceSession};
use nexzi_chat::{
    create_router, AppState, AudioFile, CaptureSource, Config, FileDevices, GeminiLiveConnector,
    Pcm16Decoder,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "nexzi-chat", about = "Multi-model chat with realtime voice", version)]
struct Cli {
    /// Configuration file (without extension)
    #[arg(short, long, default_value = "config/nexzi-chat")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Send one prompt and print the reply
    Chat {
        /// Model slug (gemini, insanity-v1, nexzi-ivision-1o, core-nexzi)
        #[arg(short, long, default_value = "gemini")]
        model: Model,

        /// Execute the research plan right away when one is proposed
        #[arg(long)]
        execute_plan: bool,

        #[arg(required = true)]
        prompt: Vec<String>,
    },

    /// Hold a voice conversation, speaking a WAV file into the realtime channel
    Talk {
        /// WAV file replayed as the microphone
        #[arg(short, long)]
        input: PathBuf,

        /// Render synthesized speech to this WAV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// History the finalized turns are saved to
        #[arg(short, long, default_value = "gemini")]
        model: Model,

        #[arg(long, value_enum, default_value_t = TalkMode::Inline)]
        mode: TalkMode,

        /// Seconds to keep listening after the input has been spoken
        #[arg(long, default_value_t = 10)]
        linger: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TalkMode {
    /// Save each turn as soon as it completes
    Inline,
    /// Save the whole conversation when the session ends
    Live,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    if cfg.gemini.api_key.is_empty() {
        warn!("No Gemini API key configured; Gemini-backed models will fail");
    }

    let store = Arc::new(HistoryStore::load(&cfg.history.path));

    match cli.command {
        Commands::Serve => serve(&cfg, store).await,
        Commands::Chat {
            model,
            execute_plan,
            prompt,
        } => chat(&cfg, store, model, &prompt.join(" "), execute_plan).await,
        Commands::Talk {
            input,
            output,
            model,
            mode,
            linger,
        } => talk(&cfg, store, input, output, model, mode, linger).await,
    }
}

fn chat_service(cfg: &Config, store: Arc<HistoryStore>) -> ChatService {
    let client = GeminiClient::with_base_url(
        cfg.gemini.base_url.clone(),
        cfg.gemini.api_key.clone(),
        cfg.gemini.chat_model.clone(),
    );
    ChatService::new(ModelRouter::new(Arc::new(client), cfg.mock_delay()), store)
}

async fn serve(cfg: &Config, store: Arc<HistoryStore>) -> Result<()> {
    let state = AppState::new(Arc::new(chat_service(cfg, store)));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")
}

async fn chat(
    cfg: &Config,
    store: Arc<HistoryStore>,
    model: Model,
    prompt: &str,
    execute_plan: bool,
) -> Result<()> {
    let service = chat_service(cfg, store);

    for message in service.send_message(model, prompt).await {
        if message.model.is_some() {
            println!("{}: {}", model, message.text);
        }

        if execute_plan && message.plan.is_some() {
            if let Some(result) = service.execute_plan(model, message.id).await {
                println!("\n{}: {}", model, result.text);
                for source in result.sources.unwrap_or_default() {
                    println!("  - {} <{}>", source.title, source.uri);
                }
            }
        }
    }

    Ok(())
}

async fn talk(
    cfg: &Config,
    store: Arc<HistoryStore>,
    input: PathBuf,
    output: Option<PathBuf>,
    model: Model,
    mode: TalkMode,
    linger: u64,
) -> Result<()> {
    let spoken = AudioFile::open(&input)?.duration_seconds;

    let session_config = cfg.live_session();
    let devices = FileDevices {
        source: CaptureSource::File(input),
        output_path: output,
        realtime: true,
    };
    let connector = GeminiLiveConnector::with_url(cfg.gemini.live_url.clone(), cfg.gemini.api_key.clone());
    let decoder = Pcm16Decoder {
        sample_rate: session_config.playback_sample_rate,
        channels: 1,
    };
    let turns: Arc<dyn TurnSink> = match mode {
        TalkMode::Inline => Arc::new(PerTurnCommit::new(Arc::clone(&store), model)),
        TalkMode::Live => Arc::new(DeferredCommit::new(Arc::clone(&store), model)),
    };

    let session = VoiceSession::new(
        session_config,
        Arc::new(devices),
        Arc::new(connector),
        Arc::new(decoder),
        turns,
    );

    let mut captions = session.subscribe_caption();
    let caption_task = tokio::spawn(async move {
        while captions.changed().await.is_ok() {
            let caption = captions.borrow_and_update().clone();
            if !caption.is_empty() {
                println!("bot: {}", caption);
            }
        }
    });

    session.start().await?;

    let mut state = session.subscribe_state();
    let deadline = Duration::from_secs_f64(spoken) + Duration::from_secs(linger);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = tokio::time::sleep(deadline) => info!("Conversation window elapsed"),
        ended = state.wait_for(|s| matches!(s, SessionState::Idle | SessionState::Error)) => {
            if let Ok(s) = ended {
                warn!("Voice session ended early: {:?}", *s);
            }
        }
    }

    session.exit().await;
    caption_task.abort();

    let stats = session.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
