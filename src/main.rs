//! `termsession` CLI entry point: discovery-driven session attach/serve
//! (§4.2.1), plus session listing (§4.2.8).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use termsession::session::{self, Role, SessionConfig};
use termsession::Config;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "termsession")]
#[command(version)]
#[command(about = "PTY terminal panel and single-attachment session multiplexer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to (or start) the session for a project directory.
    Run {
        /// Project directory this session belongs to.
        project_root: PathBuf,
        /// Explicit session name, overriding the derived id.
        #[arg(long)]
        session_name: Option<String>,
        /// Override the inner application command (defaults to `$SHELL`).
        #[arg(long)]
        command: Vec<String>,
    },
    /// List live sessions under the sessions root.
    List {
        /// Sessions directory to scan (defaults to the configured root).
        #[arg(long)]
        session_dir: Option<PathBuf>,
    },
}

fn init_logging() -> Result<()> {
    let log_path = if let Ok(path) = std::env::var("TERMSESSION_LOG_FILE") {
        PathBuf::from(path)
    } else if let Ok(dir) = Config::config_dir() {
        dir.join("termsession.log")
    } else {
        PathBuf::from("/tmp/termsession.log")
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .unwrap_or_else(|e| panic!("failed to open log file at {log_path:?}: {e}"));
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {panic_info}");
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = std::io::Write::write_all(
            &mut std::io::stdout(),
            b"\x1b[?1000l\x1b[?1002l\x1b[?1003l\x1b[?1006l",
        );
        default_hook(panic_info);
    }));
}

fn install_signal_handlers() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGHUP, Arc::clone(&shutdown))?;
    Ok(shutdown)
}

/// The inner application is out of scope (§1); this stands in for "the
/// entire application" with the user's shell, or an explicit override.
fn inner_command(overrides: &[String]) -> Vec<String> {
    if !overrides.is_empty() {
        return overrides.to_vec();
    }
    vec![std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())]
}

async fn run(
    project_root: PathBuf,
    session_name: Option<String>,
    command: Vec<String>,
) -> Result<()> {
    let config = Config::load()?;
    let session_config = SessionConfig {
        project_root,
        session_name,
        disabled: false,
    };
    let socket_path = session_config.socket_path(&config.sessions_root);

    match session::discover_role(&socket_path) {
        Role::Client => {
            let outcome = session::run_client(&socket_path, config.dial_timeout()).await?;
            session::report_outcome(&outcome, "termsession run <project-root>");
        }
        Role::Server => {
            let shutdown = install_signal_handlers()?;
            let command = inner_command(&command);
            let server =
                session::Server::start(&session_config, &config.sessions_root, &command).await?;
            log::info!("session server started for {}", session_config.session_id());
            while !server.is_stopped() && !shutdown.load(Ordering::Relaxed) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            server.stop().await;
        }
    }

    Ok(())
}

fn list(session_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let root = session_dir.unwrap_or(config.sessions_root);
    let sessions = session::list_sessions(&root)?;
    if sessions.is_empty() {
        println!("No live sessions.");
        return Ok(());
    }
    for entry in sessions {
        println!("{}\t{}", entry.name, entry.socket_path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    install_panic_hook();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Run {
            project_root,
            session_name,
            command,
        } => runtime.block_on(run(project_root, session_name, command))?,
        Commands::List { session_dir } => list(session_dir)?,
    }

    Ok(())
}
