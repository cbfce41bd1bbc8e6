use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use lookout::browser::{AnchorDocument, BrowserLocator, SavedTabs, WorkspaceMarker};
use lookout::config::{self, Config};
use lookout::data::{Indicator, ProcessId, WindowHandle};
use lookout::engine::Engine;
use lookout::platform::Desktop;
use lookout::presence::{QueuedRequest, RequestQueue};
use lookout::sessions::{SessionSource, SessionStateDir};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(about = "Tracks the windows of agent sessions and tells you when one needs you")]
#[command(version)]
struct Args {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the refresh loop until Ctrl-C (default)
    Watch,
    /// Run one refresh and print the session list payload as JSON
    Snapshot,
    /// Print the detected status of every session, or of one
    Status { session: Option<String> },
    /// Focus the surface behind a session's activity label
    Focus { session: String, index: usize },
    /// Open a session's browser workspace
    OpenWorkspace {
        session: String,
        /// Label shown in the anchor tab (defaults to the session name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Save the tabs of a session's open browser workspace
    SaveTabs { session: String },
    /// Attach an editor window to a session
    TrackEditor {
        session: String,
        /// Window handle, decimal or 0x-prefixed hex
        #[arg(long, value_parser = parse_handle)]
        handle: WindowHandle,
        /// Launcher process id
        #[arg(long, default_value_t = 0)]
        pid: ProcessId,
        /// Editor name shown as the activity label
        #[arg(long, default_value = "Editor")]
        name: String,
        /// Folder the editor was opened on, used to find it again
        #[arg(long)]
        folder: Option<String>,
    },
    /// Attach a file browser window to a session
    TrackFileBrowser {
        session: String,
        #[arg(long, value_parser = parse_handle)]
        handle: WindowHandle,
    },
    /// Write the default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lookout=info".parse()?),
        )
        .init();

    if let Some(Command::Init) = args.command {
        return config::init(args.config.as_deref());
    }

    let config = config::load(args.config.as_deref())?;
    let desktop = Desktop::system(&config.browser);

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(config, desktop).await,
        Command::Snapshot => {
            let mut engine = Engine::start(config, desktop)?;
            let snapshot = engine.run_cycle();
            println!("{}", serde_json::to_string_pretty(&snapshot.ui_payload())?);
            Ok(())
        }
        Command::Status { session } => {
            let engine = Engine::start(config, desktop)?;
            let statuses: BTreeMap<String, String> = engine
                .load_sessions()
                .into_iter()
                .filter(|s| session.as_deref().map_or(true, |id| id == s.id))
                .map(|s| {
                    let status = engine.detector().status(&s.id);
                    (s.id, format!("{:?}", status))
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            Ok(())
        }
        Command::Focus { session, index } => {
            let mut engine = Engine::start(config, desktop)?;
            engine.run_cycle();
            if !engine.focus_controller().focus(&session, index)? {
                bail!("Session {} has no live surface at index {}", session, index);
            }
            Ok(())
        }
        Command::OpenWorkspace { session, name } => {
            open_workspace(&config, &desktop, &session, name).await
        }
        Command::SaveTabs { session } => save_tabs(&config, &desktop, &session),
        Command::TrackEditor {
            session,
            handle,
            pid,
            name,
            folder,
        } => queue_request(
            &config,
            QueuedRequest::Editor {
                session_id: session,
                name,
                process_id: pid,
                handle,
                folder_hint: folder,
            },
        ),
        Command::TrackFileBrowser { session, handle } => queue_request(
            &config,
            QueuedRequest::FileBrowser {
                session_id: session,
                handle,
            },
        ),
        Command::Init => Ok(()),
    }
}

async fn watch(config: Config, desktop: Desktop) -> Result<()> {
    let engine = Engine::start(config, desktop)?;
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut last: BTreeMap<String, (String, Indicator)> = BTreeMap::new();
    let refresh = engine.spawn(shutdown.clone(), move |snapshot| {
        for (id, presence) in &snapshot.sessions {
            let current = (presence.activity_text(), presence.indicator);
            if last.get(id) == Some(&current) {
                continue;
            }
            tracing::info!(
                "{} [{:?}] {}",
                presence.display_name,
                presence.indicator,
                if current.0.is_empty() { "-" } else { current.0.as_str() }
            );
            last.insert(id.clone(), current);
        }
        last.retain(|id, _| snapshot.sessions.contains_key(id));
    })?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown.store(true, Ordering::SeqCst);

    tokio::task::spawn_blocking(move || refresh.join())
        .await?
        .map_err(|_| anyhow!("Refresh thread panicked"))
}

fn locator(config: &Config, desktop: &Desktop) -> Result<BrowserLocator> {
    Ok(BrowserLocator::new(
        desktop.browser.clone(),
        AnchorDocument::new(config.anchor_document_path()?),
    ))
}

async fn open_workspace(
    config: &Config,
    desktop: &Desktop,
    session_id: &str,
    name: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => {
            let sessions = SessionStateDir::new(
                config.session_state_dir(),
                config.aliases_path()?,
                config.active_registry_path()?,
                desktop.processes.clone(),
            );
            sessions
                .load_sessions()
                .into_iter()
                .find(|s| s.id == session_id)
                .map(|s| s.display_name())
                .with_context(|| format!("Unknown session {}", session_id))?
        }
    };

    let marker = WorkspaceMarker::new(session_id).with_label(name);
    let restore = SavedTabs::new(config.saved_tabs_path()?).load(session_id);
    let window = locator(config, desktop)?
        .open(&marker, config.browser.open_timeout(), &restore)
        .await?;
    println!("Workspace {} is open in window {}", session_id, window);
    queue_request(
        config,
        QueuedRequest::Workspace {
            session_id: session_id.to_string(),
            handle: window,
        },
    )
}

/// Hand a surface to the running refresh loop
fn queue_request(config: &Config, request: QueuedRequest) -> Result<()> {
    let queue = RequestQueue::new(config.track_requests_path()?);
    queue.push(request)?;
    tracing::debug!("Queued tracking request in {}", queue.path().display());
    Ok(())
}

fn parse_handle(value: &str) -> std::result::Result<WindowHandle, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed
        .map(WindowHandle)
        .map_err(|e| format!("invalid window handle '{}': {}", value, e))
}

fn save_tabs(config: &Config, desktop: &Desktop, session_id: &str) -> Result<()> {
    let locator = locator(config, desktop)?;
    let marker = WorkspaceMarker::new(session_id);
    let window = locator
        .is_open(&marker)
        .with_context(|| format!("No open workspace for {}", session_id))?;

    let urls = locator.capture_tab_urls(window, &marker)?;
    let count = urls.len();
    SavedTabs::new(config.saved_tabs_path()?).save(session_id, urls)?;
    println!("Saved {} tab(s) for {}", count, session_id);
    Ok(())
}
