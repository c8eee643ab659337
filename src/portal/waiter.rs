use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::browser::PortalDriver;
use crate::config::WaitConfig;
use crate::error::{PortalError, Result};

/// Bounded polling for asynchronously rendered portal content.
///
/// Nothing in the flow may assume a page has rendered: every element lookup
/// goes through `wait_for`, which polls at a fixed interval and gives up after
/// a fixed number of empty polls.
#[derive(Debug, Clone, Copy)]
pub struct ElementWaiter {
    max_attempts: u32,
    poll_interval: Duration,
}

impl ElementWaiter {
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            poll_interval,
        }
    }

    pub fn from_config(wait: &WaitConfig) -> Self {
        Self::new(wait.max_attempts, wait.poll_interval())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `probe` until it yields a value or the attempt budget is spent.
    pub async fn poll<T, F, Fut>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = probe().await {
                return Some(value);
            }
            if attempt < self.max_attempts {
                sleep(self.poll_interval).await;
            }
        }
        None
    }

    /// Wait until `selector` matches at least one element and return the
    /// number of matches.
    ///
    /// Query errors (a page mid-navigation has no execution context) count as
    /// empty polls. On exhaustion the page HTML is logged and returned inside
    /// `PortalError::ElementNotFound` along with `context`.
    pub async fn wait_for<D>(&self, driver: &D, selector: &str, context: &str) -> Result<usize>
    where
        D: PortalDriver + ?Sized,
    {
        let found = self
            .poll(|| async move {
                match driver.count(selector).await {
                    Ok(0) => None,
                    Ok(n) => Some(n),
                    Err(e) => {
                        tracing::debug!("Query for '{}' failed: {}", selector, e);
                        None
                    }
                }
            })
            .await;

        if let Some(n) = found {
            return Ok(n);
        }

        let html = driver.html().await.unwrap_or_default();
        tracing::debug!("Gave up waiting for '{}' ({}). Page HTML:\n{}", selector, context, html);

        Err(PortalError::ElementNotFound {
            selector: selector.to_string(),
            context: context.to_string(),
            html,
        })
    }
}

impl Default for ElementWaiter {
    fn default() -> Self {
        Self::from_config(&WaitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::fake::{FakeDriver, Page};

    #[tokio::test]
    async fn returns_match_count_once_rendered() {
        let driver = FakeDriver::default();
        driver.state().render_after = 2;
        driver.state().page = Page::AppList;
        driver.state().apps = vec!["com.example.app".to_string(); 2];

        let waiter = ElementWaiter::new(5, Duration::from_millis(1));
        let n = waiter
            .wait_for(&driver, "//td[@title='com.example.app']", "app list")
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(driver.state().count_calls, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_with_html_and_context() {
        let driver = FakeDriver::default();
        let waiter = ElementWaiter::new(4, Duration::from_millis(1));

        let err = waiter
            .wait_for(&driver, "#aprerelease", "authenticated landing page")
            .await
            .unwrap_err();

        assert_eq!(driver.state().count_calls, 4);
        match err {
            PortalError::ElementNotFound {
                selector,
                context,
                html,
            } => {
                assert_eq!(selector, "#aprerelease");
                assert_eq!(context, "authenticated landing page");
                assert!(html.contains("<html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_errors_count_as_empty_polls() {
        let driver = FakeDriver::default();
        driver.state().page = Page::Root;
        driver.state().failing_queries = 2;

        let waiter = ElementWaiter::new(5, Duration::from_millis(1));
        let n = waiter.wait_for(&driver, ".button.blue", "sign in").await.unwrap();

        assert_eq!(n, 1);
        assert_eq!(driver.state().count_calls, 3);
    }
}
