pub mod browsers;
pub mod config;
pub mod fetch;
pub mod login;

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pushcert::browser::{start_session, CdpDriver};
use pushcert::config::Config;
use pushcert::credentials::EnvCredentialProvider;
use pushcert::error::Result;
use pushcert::portal::{PortalSession, SigningRequestProvider};

use crate::cli::Cli;

/// Launch the browser and wrap it in a portal session.
async fn open_session(
    cli: &Cli,
    config: Config,
    signing_request: Arc<dyn SigningRequestProvider>,
) -> Result<PortalSession<CdpDriver>> {
    let spinner = create_spinner(cli.json, "Starting browser...");
    let driver = match start_session(&config).await {
        Ok(driver) => driver,
        Err(e) => {
            clear_spinner(spinner);
            return Err(e);
        }
    };
    finish_spinner(spinner, "Browser ready");

    let credentials = EnvCredentialProvider::new(cli.username.clone());
    Ok(PortalSession::new(driver, config, signing_request)?.with_credentials(Arc::new(credentials)))
}

fn create_spinner(json: bool, message: &str) -> Option<ProgressBar> {
    if json {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("  {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} {}", "✓".green(), message));
    }
}

fn clear_spinner(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}
