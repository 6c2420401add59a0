use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chatline::app::{App, AppError};
use chatline::assistant::Assistant;
use chatline::assistant::gemini::GeminiClient;
use chatline::assistant::types::InferenceError;
use chatline::config::{AppConfig, MIN_POLL_INTERVAL_MS};
use chatline::controller::SyncController;
use chatline::error::{ErrorCode, describe};
use chatline::model::OrderBy;
use chatline::session::firebase::AnonymousAuth;
use chatline::session::{self, BootstrapOutcome, Session, SessionError, SessionProvider};
use chatline::store::StoreError;
use chatline::store::firestore::FirestoreStore;
use chatline::ui;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    App(#[from] AppError),
}

impl ErrorCode for MainError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Session(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Inference(e) => e.error_code(),
            Self::App(e) => e.error_code(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "chatline", about = "Anonymous live chat with an AI assistant")]
struct Cli {
    /// Message collection to join. Overrides `CHAT_COLLECTION`.
    #[arg(long)]
    collection: Option<String>,

    /// How often to poll the store for new messages. Overrides
    /// `CHAT_POLL_INTERVAL_MS`.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", ui::render_config_error(&e));
            return ExitCode::FAILURE;
        }
    };
    if let Some(collection) = cli.collection {
        config.chat.collection = collection;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.chat.poll_interval = Duration::from_millis(ms.max(MIN_POLL_INTERVAL_MS));
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chatline: {}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), MainError> {
    let firebase = config.firebase;
    info!(
        project = %firebase.project_id,
        auth_domain = %firebase.auth_domain,
        bucket = %firebase.storage_bucket,
        sender = %firebase.messaging_sender_id,
        collection = %config.chat.collection,
        "chatline starting"
    );

    let auth = Arc::new(AnonymousAuth::new(firebase.api_key.clone(), firebase.app_id.clone())?);
    let (session, refresh) = match session::bootstrap(&*auth).await {
        BootstrapOutcome::Established(identity) => {
            let refresh = Arc::clone(&auth).spawn_refresh_task();
            (Session::established(identity), Some(refresh))
        }
        BootstrapOutcome::Failed(reason) => {
            warn!(%reason, "continuing without a session; sending disabled");
            (Session::unauthenticated(), None)
        }
    };

    let store = FirestoreStore::new(
        &firebase.project_id,
        firebase.api_key,
        auth.observe_identity(),
        config.chat.poll_interval,
    )?;
    let controller = Arc::new(SyncController::new(Arc::new(store), config.chat.collection));
    let stream = if session.established {
        match controller.subscribe(&OrderBy::created_at_asc()).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "live query failed to start");
                None
            }
        }
    } else {
        None
    };

    let gemini = GeminiClient::new(config.gemini)?;
    info!(model = gemini.model(), "assistant ready");
    let assistant = Arc::new(Assistant::new(Arc::new(gemini)));

    let app = App::new(Arc::clone(&controller), session, assistant, std::io::stdout());
    let result = app.run(BufReader::new(tokio::io::stdin()), stream).await;

    if let Some(refresh) = refresh {
        refresh.abort();
    }
    result?;
    Ok(())
}
