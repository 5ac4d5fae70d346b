//! netcontrol - manage home network devices, blocked sites and schedules
//! from the terminal.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod context;

/// netcontrol - home network control
#[derive(Parser, Debug)]
#[command(name = "netcontrol")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server base URL (overrides the config file)
    #[arg(long, env = "NETCONTROL_BASE_URL")]
    base_url: Option<String>,

    /// Dashboard data source: remote or fixture
    #[arg(long, env = "NETCONTROL_DATA_SOURCE")]
    data_source: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Account ===
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in
    Login {
        /// Defaults to the last email used
        #[arg(long)]
        email: Option<String>,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the configuration and who is signed in
    Status,

    // === Devices ===
    /// List devices on the network
    Devices,

    /// Block a device by IP
    Block { ip: String },

    /// Unblock a device by IP
    Unblock { ip: String },

    // === Blocked sites ===
    /// List blocked sites
    Sites,

    /// Add a site to the block list
    BlockSite { url: String },

    /// Remove a site from the block list
    UnblockSite { url: String },

    // === Schedules ===
    /// List blocking schedules
    Schedules,

    /// Save a schedule (times as HH:MM)
    Schedule {
        start: String,
        end: String,
        /// block or allow
        action: String,
    },

    // === Offline cache ===
    /// Offline asset cache
    #[command(subcommand)]
    Offline(OfflineCommands),
}

#[derive(Subcommand, Debug)]
enum OfflineCommands {
    /// Install the current cache generation and drop older ones
    Install {
        /// JSON manifest to use instead of the built-in one
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Fetch a URL through the offline cache
    Get {
        url: String,

        /// Write the body here instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fetch as a page load (falls back to the app shell offline)
        #[arg(long)]
        page: bool,
    },

    /// List entries in the current generation
    List,
}

fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let ctx = context::AppContext::load(cli.base_url.as_deref(), cli.data_source.as_deref())?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => commands::register(&ctx, name, email, password).await,
        Commands::Login { email, password } => commands::login(&ctx, email, password).await,
        Commands::Logout => commands::logout(&ctx),
        Commands::Status => commands::status(&ctx),
        Commands::Devices => commands::devices(&ctx).await,
        Commands::Block { ip } => commands::set_device(&ctx, &ip, true).await,
        Commands::Unblock { ip } => commands::set_device(&ctx, &ip, false).await,
        Commands::Sites => commands::sites(&ctx).await,
        Commands::BlockSite { url } => commands::block_site(&ctx, &url).await,
        Commands::UnblockSite { url } => commands::unblock_site(&ctx, &url).await,
        Commands::Schedules => commands::schedules(&ctx).await,
        Commands::Schedule { start, end, action } => {
            commands::save_schedule(&ctx, &start, &end, &action).await
        }
        Commands::Offline(cmd) => match cmd {
            OfflineCommands::Install { manifest } => {
                commands::offline_install(&ctx, manifest.as_deref()).await
            }
            OfflineCommands::Get { url, output, page } => {
                commands::offline_get(&ctx, &url, output.as_deref(), page).await
            }
            OfflineCommands::List => commands::offline_list(&ctx).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_schedule() {
        let cli = Cli::try_parse_from(["netcontrol", "schedule", "21:00", "07:00", "block"]).unwrap();
        match cli.command {
            Commands::Schedule { start, end, action } => {
                assert_eq!((start.as_str(), end.as_str(), action.as_str()), ("21:00", "07:00", "block"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_offline_get() {
        let cli = Cli::try_parse_from(["netcontrol", "offline", "get", "/styles.css", "--page"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Offline(OfflineCommands::Get { page: true, .. })
        ));
    }

    #[test]
    fn test_parse_block_site_kebab_case() {
        let cli = Cli::try_parse_from(["netcontrol", "block-site", "example.com"]).unwrap();
        assert!(matches!(cli.command, Commands::BlockSite { url } if url == "example.com"));
    }
}
