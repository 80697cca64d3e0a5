mod cli;

use anyhow::anyhow;
use compliance_chat::clock::{Clock, SystemClock};
use compliance_chat::config::Config;
use compliance_chat::repl;
use compliance_chat::session::ChatSession;
use compliance_chat::storage::FileStore;
use compliance_chat::types::Environment;
use compliance_chat::view::TerminalView;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")] // one UI loop, one outstanding call
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    cli::init_logging(log_level.as_deref());

    if matches.get_flag("version") {
        println!("compliance-chat {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut cfg = Config::from_env().map_err(|e| anyhow!(e))?;
    if matches.get_flag("production") {
        cfg.environment = Environment::Production;
    }
    if let Some(path) = matches.get_one::<String>("state-file") {
        cfg.state_file = PathBuf::from(path);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if matches.get_flag("countdown") {
        repl::run_countdown(clock.as_ref(), std::io::stdout(), None).await?;
        return Ok(());
    }

    info!("Quota state at {}", cfg.state_file.display());
    let store = Box::new(FileStore::new(cfg.state_file.clone()));
    let view = Box::new(TerminalView::new(std::io::stdout()));
    let session = ChatSession::from_config(&cfg, store, clock, view)?;

    if matches.get_flag("status") {
        session.check_quota()?;
        session.show_status();
        return Ok(());
    }

    if let Some(message) = matches.get_one::<String>("message") {
        session.start();
        session.submit(message).await;
        return Ok(());
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    repl::run_interactive(&session, stdin).await?;
    Ok(())
}
