//! The portal workflow: login, app lookup and certificate provisioning.
//!
//! Every operation runs against one [`PortalSession`], which owns the browser
//! driver and the collaborators the flow needs. Public operations route any
//! failure through [`Diagnostics`] exactly once before returning it.

mod apps;
mod certificate;
mod diagnostics;
mod download;
mod login;
mod waiter;

#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;

pub use certificate::{
    write_artifact, CertificateEnvironment, CertificateRequest, SigningRequestProvider,
};
pub use diagnostics::Diagnostics;
pub use download::{cookie_header, download_url, CertificateDownloader, HttpDownloader};
pub use login::{
    format_team_list, resolve_choice, teams_from_options, Team, TeamPrompt, TerminalTeamPrompt,
};
pub use waiter::ElementWaiter;

use crate::browser::PortalDriver;
use crate::config::{Config, Selectors};
use crate::credentials::{CredentialProvider, EnvCredentialProvider};
use crate::error::Result;

/// The single authenticated browser context of a provisioning run.
pub struct PortalSession<D: PortalDriver> {
    driver: D,
    config: Config,
    waiter: ElementWaiter,
    credentials: Arc<dyn CredentialProvider>,
    team_prompt: Arc<dyn TeamPrompt>,
    signing_request: Arc<dyn SigningRequestProvider>,
    downloader: Arc<dyn CertificateDownloader>,
    diagnostics: Diagnostics,
    authenticated: bool,
}

impl<D: PortalDriver> PortalSession<D> {
    /// Session with the default collaborators: credentials from the
    /// environment or a terminal prompt, terminal team picker, HTTP download.
    pub fn new(
        driver: D,
        config: Config,
        signing_request: Arc<dyn SigningRequestProvider>,
    ) -> Result<Self> {
        let downloader = HttpDownloader::new(&config.portal.language)?;

        Ok(Self {
            waiter: ElementWaiter::from_config(&config.wait),
            diagnostics: Diagnostics::from_config(&config.output),
            credentials: Arc::new(EnvCredentialProvider::new(None)),
            team_prompt: Arc::new(TerminalTeamPrompt),
            downloader: Arc::new(downloader),
            signing_request,
            driver,
            config,
            authenticated: false,
        })
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_team_prompt(mut self, team_prompt: Arc<dyn TeamPrompt>) -> Self {
        self.team_prompt = team_prompt;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn CertificateDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn selectors(&self) -> &Selectors {
        &self.config.selectors
    }

    /// Hand a finished operation to the diagnostics handler.
    async fn finish<T>(&self, result: Result<T>) -> Result<T> {
        self.diagnostics.on_error(&self.driver, result).await
    }
}
