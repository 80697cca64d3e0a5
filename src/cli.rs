use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("compliance-chat")
        .about("Compliance chat client with a daily query quota")
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .num_args(1)
                .help("Send a single message and exit"),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .help("Use the production webhook instead of the test one")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("state-file")
                .long("state-file")
                .num_args(1)
                .help("Path of the quota storage file (overrides CHAT_STATE_FILE)"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .help("Print remaining quota and time until reset, then exit")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["message", "countdown"]),
        )
        .arg(
            Arg::new("countdown")
                .long("countdown")
                .help("Show a live countdown to the next quota reset")
                .action(ArgAction::SetTrue)
                .conflicts_with("message"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, then RUST_LOG, then info. Logs go to stderr.
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
