#![deny(unsafe_code)]

mod render;
mod script;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use murmur_chat::{ChatClient, ClientRuntime, RecordingTransport};
use murmur_storage::{DraftStore, MemoryDraftStore, SqliteDraftStore};
use snafu::ResultExt;
use tracing_subscriber::EnvFilter;

use crate::script::{
    RunnerResult, RuntimeJoinSnafu, Script, SettingsSnafu, StepAction, StorageSnafu,
};
use crate::settings::{Settings, SettingsStore};

const SETTLE_YIELDS: usize = 8;

/// Replays a scripted chat session against the client core and prints the resulting panels.
#[derive(Debug, Parser)]
#[command(name = "murmur", version)]
struct Cli {
    /// JSON script of transport responses and user input.
    #[arg(long)]
    script: PathBuf,
    /// Settings file; defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite draft database, overriding the configured one.
    #[arg(long)]
    database: Option<PathBuf>,
    /// Persist the effective settings back to the settings file.
    #[arg(long)]
    write_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => match SettingsStore::open(path.clone()) {
            Ok(store) => store,
            Err(error) => {
                eprintln!("runner_error={error}");
                return ExitCode::FAILURE;
            }
        },
        None => SettingsStore::load(),
    };
    init_logging(&store.settings().log_filter);

    if let Err(error) = run(cli, store).await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, store: SettingsStore) -> RunnerResult<()> {
    let mut settings = Settings::clone(&store.settings());
    if let Some(database) = cli.database {
        settings.database_path = Some(database);
    }
    if cli.write_config {
        store.update(settings.clone()).context(SettingsSnafu {
            stage: "write-settings",
        })?;
    }

    let script = Script::from_path(&cli.script)?;
    println!("script={}", cli.script.display());
    println!("config={}", store.config_path().display());

    let drafts = open_drafts(&settings).await?;
    let transport = Arc::new(RecordingTransport::new());
    let client = ChatClient::new(settings.chat.clone(), transport.clone(), drafts.clone());
    let (runtime, handle) = ClientRuntime::new(client);
    let task = tokio::spawn(runtime.run());

    for step in script.steps {
        match step.into_action() {
            StepAction::Send(event) => {
                handle.send(event);
            }
            StepAction::Wait(duration) => tokio::time::sleep(duration).await,
        }
        tokio::task::yield_now().await;
    }

    // Deferred draft loads re-enter the queue; let them land ahead of the shutdown.
    for _ in 0..SETTLE_YIELDS {
        tokio::task::yield_now().await;
    }
    handle.shutdown();
    let client = task.await.context(RuntimeJoinSnafu {
        stage: "join-runtime",
    })?;

    let mut panels = client.panels().collect::<Vec<_>>();
    panels.sort_by(|left, right| left.conversation_id().cmp(right.conversation_id()));
    for panel in panels {
        print!("{}", render::render_panel(panel));
    }

    for call in transport.calls() {
        match serde_json::to_string(&call) {
            Ok(line) => println!("transport {line}"),
            Err(error) => tracing::warn!(error = %error, "failed to encode transport call"),
        }
    }

    let stored = drafts.list_drafts().context(StorageSnafu {
        stage: "list-drafts",
    })?;
    for draft in stored {
        println!("draft {}={:?}", draft.conversation_id, draft.text);
    }

    println!("runner_ok=true");
    Ok(())
}

async fn open_drafts(settings: &Settings) -> RunnerResult<Arc<dyn DraftStore>> {
    let Some(path) = settings.database_path.as_ref() else {
        tracing::info!("no draft database configured, keeping drafts in memory");
        return Ok(Arc::new(MemoryDraftStore::new()));
    };

    let location = path.to_string_lossy();
    let store = SqliteDraftStore::open(&location)
        .await
        .context(StorageSnafu {
            stage: "open-draft-database",
        })?;
    Ok(Arc::new(store))
}
