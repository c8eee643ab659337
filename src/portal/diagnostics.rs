use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::browser::PortalDriver;
use crate::config::OutputConfig;
use crate::error::Result;

/// Screenshots the page whenever a portal operation fails.
///
/// Purely an observability side effect on the unwind path: the original error
/// always reaches the caller unchanged, even when the screenshot itself fails.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    screenshot_dir: PathBuf,
    open_viewer: bool,
}

impl Diagnostics {
    pub fn new(screenshot_dir: impl Into<PathBuf>, open_viewer: bool) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
            open_viewer,
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(output.screenshot_dir.clone(), output.open_screenshots)
    }

    /// `Error<unix seconds>.png` inside the screenshot directory
    pub fn screenshot_path(&self, timestamp: u64) -> PathBuf {
        self.screenshot_dir.join(format!("Error{}.png", timestamp))
    }

    /// Capture once for a failed result, then hand the result back untouched.
    pub async fn on_error<D, T>(&self, driver: &D, result: Result<T>) -> Result<T>
    where
        D: PortalDriver + ?Sized,
    {
        if let Err(ref e) = result {
            tracing::debug!("Capturing diagnostics for: {}", e);
            self.capture(driver).await;
        }
        result
    }

    /// Best-effort full-page screenshot; returns where it was written.
    pub async fn capture<D>(&self, driver: &D) -> Option<PathBuf>
    where
        D: PortalDriver + ?Sized,
    {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = self.screenshot_path(timestamp);

        let png = match driver.screenshot_full_page().await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!("Failed to take error screenshot: {}", e);
                return None;
            }
        };

        if let Err(e) = std::fs::create_dir_all(&self.screenshot_dir)
            .and_then(|_| std::fs::write(&path, png))
        {
            tracing::warn!("Failed to save error screenshot {}: {}", path.display(), e);
            return None;
        }

        tracing::info!("Saved error screenshot to {}", path.display());
        if self.open_viewer {
            open_in_viewer(&path);
        }
        Some(path)
    }
}

fn open_in_viewer(path: &Path) {
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg(path);
        c
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(path);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    };

    if let Err(e) = command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        tracing::debug!("Could not open {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::portal::fake::FakeDriver;

    #[test]
    fn screenshot_is_named_by_timestamp() {
        let diagnostics = Diagnostics::new("/tmp/shots", false);
        assert_eq!(
            diagnostics.screenshot_path(1700000000),
            PathBuf::from("/tmp/shots/Error1700000000.png")
        );
    }

    #[tokio::test]
    async fn error_is_returned_unchanged_after_one_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::default();
        let diagnostics = Diagnostics::new(dir.path(), false);

        let result: Result<()> = Err(PortalError::login("wrong password"));
        let result = diagnostics.on_error(&driver, result).await;

        assert!(matches!(result, Err(PortalError::Login(msg)) if msg == "wrong password"));
        assert_eq!(driver.state().screenshots, 1);

        let pngs: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(pngs.len(), 1);
    }

    #[tokio::test]
    async fn success_takes_no_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::default();
        let diagnostics = Diagnostics::new(dir.path(), false);

        let value = diagnostics.on_error(&driver, Ok(7)).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(driver.state().screenshots, 0);
    }

    #[tokio::test]
    async fn failing_screenshot_does_not_replace_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FakeDriver::default();
        driver.state().screenshot_fails = true;
        let diagnostics = Diagnostics::new(dir.path(), false);

        let result: Result<()> = Err(PortalError::general("no app"));
        let err = diagnostics.on_error(&driver, result).await.unwrap_err();

        assert!(matches!(err, PortalError::General(msg) if msg == "no app"));
    }
}
