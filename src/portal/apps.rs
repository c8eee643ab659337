use tokio::time::sleep;

use super::PortalSession;
use crate::browser::PortalDriver;
use crate::error::{PortalError, Result};

impl<D: PortalDriver> PortalSession<D> {
    /// Open the detail page of the app registered under `app_identifier`.
    ///
    /// Logs in first when the session is not authenticated yet.
    pub async fn open_app_page(&mut self, app_identifier: &str) -> Result<()> {
        let result = self.lookup(app_identifier).await;
        self.finish(result).await
    }

    async fn lookup(&mut self, app_identifier: &str) -> Result<()> {
        self.ensure_logged_in().await?;
        self.open_app(app_identifier).await
    }

    pub(super) async fn open_app(&self, app_identifier: &str) -> Result<()> {
        tracing::info!("Opening app page for '{}'", app_identifier);

        if !self.driver.navigate(&self.config.portal.app_ids_url).await? {
            return Err(PortalError::general("Could not open the app identifiers page"));
        }

        let row = self.selectors().app_row_for(app_identifier);
        let matches = self
            .waiter
            .wait_for(&self.driver, &row, "app identifiers listing")
            .await
            .unwrap_or(0);

        match matches {
            0 => Err(PortalError::general(format!(
                "Could not find app with identifier '{}' on apps page.",
                app_identifier
            ))),
            1 => {
                self.driver.click(&row, 0).await?;
                // The row opens the detail view without a distinct loaded marker
                sleep(self.config.wait.settle()).await;
                Ok(())
            }
            n => Err(PortalError::general(format!(
                "Found {} apps matching identifier '{}' on apps page, expected exactly one.",
                n, app_identifier
            ))),
        }
    }
}
