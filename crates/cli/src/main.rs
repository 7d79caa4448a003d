use clap::{Parser, Subcommand};
use lib::rules::RuleRegistry;

#[derive(Parser)]
#[command(name = "embedfix")]
#[command(about = "Rewrite social links in Discord channels to embed-friendly domains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: EMBEDFIX_CONFIG_PATH or ~/.embedfix/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Connect to Discord and rewrite links until Ctrl+C. The token comes from DISCORD_BOT_TOKEN, BOT_TOKEN, or discord.botToken.
    Run {
        /// Config file path (default: EMBEDFIX_CONFIG_PATH or ~/.embedfix/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Show how a message would be rewritten, without connecting to Discord.
    Check {
        /// Message text to run through the rules.
        text: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("embedfix {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_bot(config).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { text }) => {
            if let Err(e) = run_check(&text) {
                log::error!("check failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_bot(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::info!("using config {}", path.display());
    lib::bot::run_bot(config).await
}

fn run_check(text: &str) -> anyhow::Result<()> {
    let registry = RuleRegistry::builtin()?;
    match registry.find_first_match(text) {
        Some(result) => {
            println!("{}", result.new_text);
            println!("original: {} ({})", result.original.url, result.original.label);
        }
        None => println!("no match"),
    }
    Ok(())
}
