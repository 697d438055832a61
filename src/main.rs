//! Booking Sync CLI application
//!
//! Command-line front end over the reservation sync engine.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use booking_sync::cli::{
    handle_book, handle_cancel, handle_config, handle_forget, handle_list, handle_show, Cli,
    Commands,
};
use booking_sync::config::AppConfig;
use booking_sync::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if let Commands::Config = cli.command {
        return handle_config();
    }

    let config = AppConfig::load(cli.global.config.clone()).await?;
    init_logging(&cli, &config);

    info!("Booking Sync v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Gateway base URL: {}", config.gateway.base_url);

    match cli.command {
        Commands::List(args) => handle_list(&cli.global, &config, args).await,
        Commands::Book(args) => handle_book(&cli.global, &config, args).await,
        Commands::Cancel { id } => handle_cancel(&cli.global, &config, id).await,
        Commands::Show { json } => handle_show(&cli.global, &config, json).await,
        Commands::Forget => handle_forget(&cli.global, &config).await,
        Commands::Config => handle_config(),
    }
}

/// Initialize logging from the CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = if cli.has_verbosity_flag() {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.clone()
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("booking_sync={}", level).parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
