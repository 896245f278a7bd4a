use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "shelvery",
    about = "Tag-driven snapshot lifecycle management for managed databases",
    version
)]
struct Cli {
    /// Extra configuration file, applied after the standard locations
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// RDS instance backup commands
    #[clap(subcommand)]
    Rds(engine::cli::RdsCommands),

    /// List the registered backup engines
    Engines,

    /// Print the effective configuration
    Config,
}

fn init_logging() -> Result<()> {
    let logger = env_logger::Builder::new()
        .format_timestamp(None)
        .format_level(true)
        .format_module_path(false)
        .format_indent(Some(4))
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();

    let max_level = logger.filter();
    log::set_boxed_logger(Box::new(sentry_log::SentryLogger::with_dest(logger)))?;
    log::set_max_level(max_level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Sentry stays disabled unless SENTRY_DSN is set
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    init_logging()?;

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Rds(rds_command) => {
            engine::cli::commands::run_rds(rds_command, config_path).await?
        }
        Commands::Engines => engine::cli::commands::list_engines(config_path).await?,
        Commands::Config => {
            let config = engine::cli::commands::load_config(config_path)?;
            print!("{}", common::config::render_config(&config)?);
        }
    }

    Ok(())
}
