use clap::{Parser, Subcommand};

pub mod generate;
pub mod id;
pub mod init;
pub mod phrase;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(name = "sogs-bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Community server bot with blinded-key authentication", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.local/share/sogs-bot/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the recovery phrase
        #[arg(long)]
        phrase_file: Option<String>,
    },

    /// Create a default config file and recovery phrase
    Init {
        /// Path to config file (default: ~/.local/share/sogs-bot/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Generate a new recovery phrase
    Generate {
        /// Save the phrase to this file (mode 0600) instead of only printing it
        #[arg(long)]
        output: Option<String>,
    },

    /// Show the bot's account, unblinded and blinded IDs
    Id {
        /// Path to config file (default: ~/.local/share/sogs-bot/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the recovery phrase
        #[arg(long)]
        phrase_file: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            config,
            phrase_file,
        } => run::execute(config, phrase_file).await,
        Commands::Init { config, force } => init::execute(config, force),
        Commands::Generate { output } => generate::execute(output),
        Commands::Id {
            config,
            phrase_file,
        } => id::execute(config, phrase_file),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
