use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pushcert::config::Config;
use pushcert::error::Result;

use crate::commands;

/// pushcert - Create Apple push notification certificates from the command line
#[derive(Parser)]
#[command(name = "pushcert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Browser executable path (overrides auto-discovery)
    #[arg(long, env = "PUSHCERT_BROWSER_PATH", global = true)]
    pub browser_path: Option<String>,

    /// Run the browser without a window (default)
    #[arg(long, global = true, overrides_with = "show_browser")]
    pub headless: bool,

    /// Show the browser window while the portal is driven
    #[arg(long, global = true, overrides_with = "headless")]
    pub show_browser: bool,

    /// Team to use for accounts on more than one team
    #[arg(long, env = "PUSHCERT_TEAM_ID", global = true)]
    pub team_id: Option<String>,

    /// Apple ID used to sign in
    #[arg(short, long, env = "PUSHCERT_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a push certificate for an app and download it
    Fetch {
        /// Bundle identifier of the app (e.g., "com.example.app")
        app_identifier: String,

        /// Certificate signing request to upload
        #[arg(long, value_name = "PATH")]
        csr: PathBuf,

        /// Create a development certificate instead of a production one
        #[arg(long)]
        development: bool,

        /// Copy the certificate into this directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Sign in and resolve the team without creating anything
    Login,

    /// List browsers that can drive the portal
    Browsers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "portal.team_id")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Remove the configuration file
    Reset,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Fetch {
                app_identifier,
                csr,
                development,
                output,
            } => {
                commands::fetch::run(
                    self,
                    app_identifier,
                    csr,
                    !*development,
                    output.as_deref(),
                )
                .await
            }
            Commands::Login => commands::login::run(self).await,
            Commands::Browsers => commands::browsers::run(self).await,
            Commands::Config { command } => commands::config::run(self, command).await,
        }
    }

    /// Loaded configuration with command-line overrides applied.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(ref path) = self.browser_path {
            config.browser.executable = Some(path.clone());
        }
        if self.headless {
            config.browser.headless = true;
        }
        if self.show_browser {
            config.browser.headless = false;
        }
        if let Some(ref team_id) = self.team_id {
            config.portal.team_id = Some(team_id.clone());
        }
    }
}
