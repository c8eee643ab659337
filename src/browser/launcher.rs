use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::time::sleep;

use super::discovery::{resolve_browser, BrowserInfo};
use crate::config::Config;
use crate::error::{PortalError, Result};

/// Target entry from the CDP /json/list endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Starts a headless-capable Chromium with CDP enabled and the portal's
/// TLS and language quirks applied.
pub struct BrowserLauncher {
    browser_info: BrowserInfo,
    cdp_port: u16,
    headless: bool,
    language: String,
    user_data_dir: PathBuf,
    extra_args: Vec<String>,
    /// Browser stderr, appended across runs
    log_file: PathBuf,
}

impl BrowserLauncher {
    pub fn from_config(config: &Config) -> Result<Self> {
        let browser_info = resolve_browser(config.browser.executable.as_deref())?;

        let user_data_dir = match config.browser.user_data_dir {
            Some(ref dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => config.output.tmp_folder.join("browser-profile"),
        };

        Ok(Self {
            browser_info,
            cdp_port: config.browser.cdp_port,
            headless: config.browser.headless,
            language: config.portal.language.clone(),
            user_data_dir,
            extra_args: config.browser.extra_args.clone(),
            log_file: config.output.tmp_folder.join("browser_log.txt"),
        })
    }

    /// Build the browser launch arguments
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.cdp_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-save-password-bubble".to_string(),
            "--disable-translate".to_string(),
            "--window-size=1920,1080".to_string(),
            // The portal's TLS setup does not validate cleanly
            "--ignore-certificate-errors".to_string(),
            format!("--lang={}", self.language),
            format!("--accept-lang={}", self.language),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Launch the browser; the process is killed when the handle drops
    pub fn launch(&self) -> Result<Child> {
        std::fs::create_dir_all(&self.user_data_dir)?;
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        let args = self.build_args();
        tracing::debug!(
            "Launching browser: {:?} with args: {:?}",
            self.browser_info.path,
            args
        );

        Command::new(&self.browser_info.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PortalError::BrowserLaunchFailed(format!(
                    "Failed to launch {}: {}",
                    self.browser_info.browser_type.name(),
                    e
                ))
            })
    }

    /// Launch the browser and return it with the WebSocket URL of its first page
    pub async fn launch_and_wait(&self) -> Result<(Child, String)> {
        let mut child = self.launch()?;

        match self.wait_for_page().await {
            Ok(ws_url) => Ok((child, ws_url)),
            Err(e) => {
                let _ = child.kill().await;
                Err(e)
            }
        }
    }

    /// Poll the CDP HTTP endpoint until a page target is available
    async fn wait_for_page(&self) -> Result<String> {
        let url = format!("http://127.0.0.1:{}/json/list", self.cdp_port);

        // Bypass any proxy for localhost
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()?;

        // Up to 10 seconds
        for i in 0..20 {
            sleep(Duration::from_millis(500)).await;

            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let pages: Vec<PageInfo> = response.json().await.map_err(|e| {
                        PortalError::CdpConnectionFailed(format!(
                            "Failed to parse CDP target list: {}",
                            e
                        ))
                    })?;

                    if let Some(ws_url) = first_page_ws_url(pages) {
                        tracing::info!("CDP ready at: {}", ws_url);
                        return Ok(ws_url);
                    }
                    tracing::debug!("No page target yet (attempt {})", i + 1);
                }
                Ok(_) => tracing::debug!("CDP not ready yet (attempt {})", i + 1),
                Err(e) => tracing::debug!("CDP connection attempt {} failed: {}", i + 1, e),
            }
        }

        Err(PortalError::CdpConnectionFailed(
            "Timeout waiting for CDP to be ready".to_string(),
        ))
    }

    pub fn browser_info(&self) -> &BrowserInfo {
        &self.browser_info
    }
}

/// Only real pages, not extensions or service workers
fn first_page_ws_url(pages: Vec<PageInfo>) -> Option<String> {
    pages
        .into_iter()
        .filter(|p| p.page_type == "page")
        .find_map(|p| {
            tracing::debug!("Using page target {} ({})", p.id, p.url);
            p.web_socket_debugger_url
        })
}
