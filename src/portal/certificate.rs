use std::fmt;
use std::path::{Path, PathBuf};

use tokio::time::sleep;

use super::download::{cookie_header, download_url};
use super::PortalSession;
use crate::browser::PortalDriver;
use crate::error::{PortalError, Result};

/// Which push service the certificate is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateEnvironment {
    Production,
    Development,
}

impl CertificateEnvironment {
    pub fn from_production(production: bool) -> Self {
        if production {
            CertificateEnvironment::Production
        } else {
            CertificateEnvironment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        *self == CertificateEnvironment::Production
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateEnvironment::Production => "production",
            CertificateEnvironment::Development => "development",
        }
    }
}

impl fmt::Display for CertificateEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One push certificate to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub app_identifier: String,
    pub environment: CertificateEnvironment,
}

impl CertificateRequest {
    pub fn new(app_identifier: impl Into<String>, production: bool) -> Self {
        Self {
            app_identifier: app_identifier.into(),
            environment: CertificateEnvironment::from_production(production),
        }
    }

    /// `aps_<environment>_<app identifier>.cer`
    pub fn file_name(&self) -> String {
        format!("aps_{}_{}.cer", self.environment, self.app_identifier)
    }

    pub fn artifact_path(&self, tmp_folder: &Path) -> PathBuf {
        tmp_folder.join(self.file_name())
    }
}

/// Supplies the certificate signing request uploaded to the portal.
pub trait SigningRequestProvider: Send + Sync {
    fn signing_request_path(&self) -> Result<PathBuf>;
}

/// A signing request generated ahead of time on disk.
impl SigningRequestProvider for PathBuf {
    fn signing_request_path(&self) -> Result<PathBuf> {
        if !self.is_file() {
            return Err(PortalError::general(format!(
                "Signing request not found at {}",
                self.display()
            )));
        }
        Ok(self.clone())
    }
}

/// Write the certificate bytes, treating an empty file as a failed write.
pub fn write_artifact(path: &Path, data: &[u8]) -> Result<()> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(folder)?;
    std::fs::write(path, data)?;

    if std::fs::metadata(path)?.len() == 0 {
        return Err(PortalError::general(format!(
            "Can't write to {}",
            folder.display()
        )));
    }
    Ok(())
}

impl<D: PortalDriver> PortalSession<D> {
    /// Create a new push certificate for `app_identifier` and download it
    /// into the temp folder, returning the artifact path.
    ///
    /// Enables the push capability on the app when it is off. That change is
    /// left in place on the portal.
    pub async fn fetch_certificate(
        &mut self,
        app_identifier: &str,
        production: bool,
    ) -> Result<PathBuf> {
        let request = CertificateRequest::new(app_identifier, production);
        let result = self.provision(&request).await;
        self.finish(result).await
    }

    async fn provision(&mut self, request: &CertificateRequest) -> Result<PathBuf> {
        self.ensure_logged_in().await?;
        self.open_app(&request.app_identifier).await?;
        self.create_certificate(request).await
    }

    async fn create_certificate(&self, request: &CertificateRequest) -> Result<PathBuf> {
        let s = self.selectors();
        let driver = &self.driver;
        let waiter = &self.waiter;

        waiter.wait_for(driver, &s.edit_button, "app detail page").await?;
        driver.click(&s.edit_button, 0).await?;
        waiter.wait_for(driver, &s.detail_panel, "app edit page").await?;

        waiter.wait_for(driver, &s.push_toggle, "push capability").await?;
        if driver.is_checked(&s.push_toggle).await? {
            tracing::info!("Push notifications already enabled");
        } else {
            tracing::warn!(
                "Push notifications are disabled for '{}', enabling them",
                request.app_identifier
            );
            driver.click(&s.push_toggle, 0).await?;
        }

        let create = s.create_certificate(request.environment.is_production());
        if waiter
            .wait_for(driver, create, "create certificate button")
            .await
            .is_err()
        {
            let url = driver.current_url().await.unwrap_or_default();
            return Err(PortalError::general(format!(
                "Could not create a new push certificate for app '{}'. There are already 2 certificates active. Please revoke one to let pushcert create a new one\n\n{}",
                request.app_identifier, url
            )));
        }

        tracing::info!(
            "Creating a new {} push certificate for '{}'",
            request.environment,
            request.app_identifier
        );
        driver.click(create, 0).await?;
        // The edit page keeps its own submit buttons until the wizard replaces it
        sleep(self.config.wait.settle()).await;

        // Stale submit buttons stay in the DOM, the live one is the last match
        let buttons = waiter.wait_for(driver, &s.wizard_next, "certificate wizard").await?;
        driver.click(&s.wizard_next, buttons - 1).await?;
        waiter.wait_for(driver, &s.upload_field, "signing request upload").await?;
        waiter.wait_for(driver, &s.wizard_back, "signing request upload").await?;

        let csr = self.signing_request.signing_request_path()?;
        tracing::info!("Uploading signing request {}", csr.display());
        waiter.wait_for(driver, &s.file_input, "file input").await?;
        driver.set_file_input(&s.file_input, &csr).await?;
        let buttons = waiter.wait_for(driver, &s.wizard_next, "generate button").await?;
        driver.click(&s.wizard_next, buttons - 1).await?;

        self.wait_for_generation().await?;

        waiter.wait_for(driver, &s.download_button, "certificate download").await?;
        let href = driver
            .attribute(&s.download_button, 0, "href")
            .await?
            .ok_or_else(|| PortalError::general("Download button has no link"))?;
        let url = download_url(&driver.current_url().await?, &href)?;

        let cookies = cookie_header(&driver.cookies().await?);
        tracing::info!("Downloading certificate");
        let data = self.downloader.download(&url, &cookies).await?;
        if data.is_empty() {
            return Err(PortalError::general(
                "Something went wrong when downloading the certificate",
            ));
        }

        let path = request.artifact_path(&self.config.output.tmp_folder);
        write_artifact(&path, &data)?;
        tracing::info!("Certificate written to {}", path.display());
        Ok(path)
    }

    /// Block until the loading indicator is gone.
    ///
    /// Generation has no completion event and no deadline. Only a run of
    /// failed queries as long as the element wait budget ends the poll early.
    async fn wait_for_generation(&self) -> Result<()> {
        let indicator = &self.selectors().loading_indicator;
        let interval = self.config.wait.generation_poll_interval();
        let mut failures = 0u32;

        tracing::info!("Waiting for the certificate to be generated");
        loop {
            match self.driver.count(indicator).await {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    failures = 0;
                    tracing::debug!("Certificate still generating");
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.waiter.max_attempts() {
                        return Err(e);
                    }
                    tracing::debug!("Generation poll failed: {}", e);
                }
            }
            sleep(interval).await;
        }
    }
}
