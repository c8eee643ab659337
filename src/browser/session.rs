use super::cdp::CdpDriver;
use super::launcher::BrowserLauncher;
use crate::config::Config;
use crate::error::Result;

/// Start the one browser session a provisioning run drives.
///
/// Creates the temp-artifacts folder, launches a browser with the portal's
/// TLS and language settings and attaches a CDP driver to its first page.
/// The browser process lives exactly as long as the returned driver.
pub async fn start_session(config: &Config) -> Result<CdpDriver> {
    std::fs::create_dir_all(&config.output.tmp_folder)?;

    let launcher = BrowserLauncher::from_config(config)?;
    tracing::info!(
        "Starting {} (headless: {})",
        launcher.browser_info().browser_type.name(),
        config.browser.headless
    );

    let (child, ws_url) = launcher.launch_and_wait().await?;
    let driver = CdpDriver::attach(&ws_url, &config.portal.language)
        .await?
        .with_browser(child);

    Ok(driver)
}
