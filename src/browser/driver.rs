use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One `<option>` of a `<select>`, in rendered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

/// A cookie currently held by the browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
}

/// The browser capabilities the portal flow is allowed to use.
///
/// Selectors starting with `//` or `(//` are evaluated as XPath, everything
/// else as CSS. Query operations never wait; callers that need rendered
/// content go through the element waiter.
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Navigate the page and report whether the navigation succeeded.
    async fn navigate(&self, url: &str) -> Result<bool>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Click the `index`-th match (0-based).
    async fn click(&self, selector: &str, index: usize) -> Result<()>;

    /// Replace the value of the first matching input.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Attribute of the `index`-th match, `None` when absent.
    async fn attribute(&self, selector: &str, index: usize, name: &str)
        -> Result<Option<String>>;

    /// Checked state of the first matching checkbox.
    async fn is_checked(&self, selector: &str) -> Result<bool>;

    /// Whether the rendered page text contains `text`.
    async fn has_text(&self, text: &str) -> Result<bool>;

    /// Options of the first matching `<select>`.
    async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>>;

    /// Select the option carrying `value` in the first matching `<select>`.
    async fn select_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Attach a local file to the first matching file input.
    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<()>;

    async fn html(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn cookies(&self) -> Result<Vec<BrowserCookie>>;

    /// PNG bytes of the whole page, beyond the viewport.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;
}
