use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use std::fs::OpenOptions;
use std::sync::Mutex;
use taskdash::cli::{self, Cli, Commands};
use taskdash::{AppContext, Config, Database, KeyValueStore, MemoryStore, Profile, SystemClock};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };
    let interactive = matches!(cli.command, None | Some(Commands::Dash));

    init_tracing(cli.verbose, interactive.then_some(profile))?;

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_with_profile(profile)?,
    };

    if cli.ephemeral {
        tracing::info!("running with in-memory storage");
        return run(MemoryStore::new(), config, cli.command);
    }

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| eyre!("Database path contains invalid UTF-8"))?,
    )?;
    run(db, config, cli.command)
}

fn run<S: KeyValueStore>(store: S, config: Config, command: Option<Commands>) -> Result<()> {
    let mut ctx = AppContext::init(store, SystemClock, config);

    match command {
        None | Some(Commands::Dash) => {
            let app = taskdash::tui::App::new(ctx)?;
            taskdash::tui::run_event_loop(app)?;
        }
        Some(command) => {
            let mut stdout = std::io::stdout().lock();
            cli::execute(command, &mut ctx, &mut stdout)?;
            ctx.shutdown();
        }
    }

    Ok(())
}

/// Logs go to stderr, or to `taskdash.log` in the data directory while the dashboard owns the terminal
fn init_tracing(verbose: bool, log_file_profile: Option<Profile>) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("TASKDASH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match log_file_profile.and_then(taskdash::utils::get_data_dir) {
        Some(dir) => {
            std::fs::create_dir_all(&dir).wrap_err("failed to create data directory")?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("taskdash.log"))
                .wrap_err("failed to open log file")?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|err| eyre!("failed to initialize tracing subscriber: {err}"))
}
