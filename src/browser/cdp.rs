use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::driver::{BrowserCookie, PortalDriver, SelectOption};
use crate::error::{PortalError, Result};

type CdpSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Defines `__findAll(selector)`: XPath when the selector starts with `//` or
/// `(//`, CSS otherwise. Always returns an array in document order.
const FIND_ALL_JS: &str = r#"
function __findAll(selector) {
    if (selector.startsWith('//') || selector.startsWith('(//')) {
        const snapshot = document.evaluate(selector, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        const found = [];
        for (let i = 0; i < snapshot.snapshotLength; i++) found.push(snapshot.snapshotItem(i));
        return found;
    }
    return Array.from(document.querySelectorAll(selector));
}
"#;

/// `PortalDriver` over a single persistent CDP connection to one page target.
///
/// Commands are serialized through the socket mutex; events arriving between
/// responses are dropped except where a command waits for one explicitly.
pub struct CdpDriver {
    socket: Mutex<CdpSocket>,
    next_id: AtomicU64,
    command_timeout: Duration,
    navigation_timeout: Duration,
    /// Launched browser process, killed when the driver drops
    #[allow(dead_code)]
    browser: Option<Child>,
}

impl CdpDriver {
    /// Connect to a page target and apply the session-wide settings:
    /// fixed Accept-Language and certificate errors ignored.
    pub async fn attach(page_ws_url: &str, language: &str) -> Result<Self> {
        let (socket, _) = connect_async(page_ws_url).await.map_err(|e| {
            PortalError::CdpConnectionFailed(format!("WebSocket connection failed: {}", e))
        })?;

        let driver = Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
            command_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
            browser: None,
        };

        driver.send("Page.enable", json!({})).await?;
        driver.send("Network.enable", json!({})).await?;
        driver
            .send(
                "Network.setExtraHTTPHeaders",
                json!({ "headers": { "Accept-Language": language } }),
            )
            .await?;
        driver
            .send("Security.setIgnoreCertificateErrors", json!({ "ignore": true }))
            .await?;

        Ok(driver)
    }

    /// Tie the browser process lifetime to this driver
    pub fn with_browser(mut self, child: Child) -> Self {
        self.browser = Some(child);
        self
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a CDP command and wait for its response.
    ///
    /// A response that misses `command_timeout` is an error; if it shows up
    /// later its id no longer matches and it is skipped.
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id();
        let mut socket = self.socket.lock().await;
        write_command(&mut socket, id, method, params).await?;

        let response = timeout(self.command_timeout, async {
            loop {
                let Some(frame) = read_frame(&mut socket).await? else {
                    continue;
                };
                if frame.get("id").and_then(Value::as_u64) == Some(id) {
                    return Ok::<_, PortalError>(frame);
                }
            }
        })
        .await
        .map_err(|_| {
            PortalError::CdpConnectionFailed(format!(
                "{} timed out after {:?}",
                method, self.command_timeout
            ))
        })??;

        command_result(method, response)
    }

    /// Evaluate an expression and return its JSON value
    async fn eval(&self, expression: &str) -> Result<Value> {
        let result = self
            .send(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("unknown exception");
            return Err(PortalError::JavaScriptError(text.to_string()));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn eval_on(&self, selector: &str, body: &str) -> Result<Value> {
        self.eval(&element_script(selector, body)?).await
    }

    async fn dispatch_click(&self, x: f64, y: f64) -> Result<()> {
        // Move first so the browser updates its hit-test target
        self.send(
            "Input.dispatchMouseEvent",
            json!({ "type": "mouseMoved", "x": x, "y": y }),
        )
        .await?;

        for event in ["mousePressed", "mouseReleased"] {
            self.send(
                "Input.dispatchMouseEvent",
                json!({
                    "type": event,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1
                }),
            )
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PortalDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<bool> {
        let id = self.next_id();
        let mut socket = self.socket.lock().await;
        write_command(&mut socket, id, "Page.navigate", json!({ "url": url })).await?;

        let deadline = Instant::now() + self.navigation_timeout;
        let mut acknowledged = false;
        let mut loaded = false;

        while !(acknowledged && loaded) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match timeout(remaining, read_frame(&mut socket)).await {
                Ok(frame) => frame?,
                Err(_) => {
                    tracing::warn!("Navigation to {} did not finish loading in time", url);
                    return Ok(false);
                }
            };
            let Some(frame) = frame else { continue };

            if frame.get("id").and_then(Value::as_u64) == Some(id) {
                let result = command_result("Page.navigate", frame)?;
                if let Some(error) = result
                    .get("errorText")
                    .and_then(Value::as_str)
                    .filter(|e| !e.is_empty())
                {
                    tracing::warn!("Navigation to {} failed: {}", url, error);
                    return Ok(false);
                }
                acknowledged = true;
            } else if frame.get("method").and_then(Value::as_str) == Some("Page.loadEventFired") {
                loaded = true;
            }
        }

        Ok(true)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.eval_on(selector, "return els.length;").await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let body = format!(
            "const el = els[{index}];
            if (!el) return null;
            el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'center' }});
            const rect = el.getBoundingClientRect();
            if (rect.width === 0 && rect.height === 0) {{ el.click(); return {{ clicked: true }}; }}
            return {{ x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};"
        );
        let target = self.eval_on(selector, &body).await?;

        if target.is_null() {
            return Err(missing(selector));
        }
        if target.get("clicked").is_some() {
            return Ok(());
        }

        let coordinate = |axis: &str| {
            target
                .get(axis)
                .and_then(Value::as_f64)
                .ok_or_else(|| PortalError::JavaScriptError("Invalid coordinates".to_string()))
        };
        self.dispatch_click(coordinate("x")?, coordinate("y")?).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let value_json = serde_json::to_string(value)?;
        let body = format!(
            "const el = els[0];
            if (!el) return false;
            el.focus();
            el.value = {value_json};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;"
        );

        if !self.eval_on(selector, &body).await?.as_bool().unwrap_or(false) {
            return Err(missing(selector));
        }
        Ok(())
    }

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<String>> {
        let name_json = serde_json::to_string(name)?;
        let body = format!(
            "const el = els[{index}];
            if (!el) return {{ found: false }};
            return {{ found: true, value: el.getAttribute({name_json}) }};"
        );
        let result = self.eval_on(selector, &body).await?;

        if !result.get("found").and_then(Value::as_bool).unwrap_or(false) {
            return Err(missing(selector));
        }
        Ok(result
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn is_checked(&self, selector: &str) -> Result<bool> {
        let checked = self
            .eval_on(selector, "const el = els[0]; if (!el) return null; return !!el.checked;")
            .await?;
        checked.as_bool().ok_or_else(|| missing(selector))
    }

    async fn has_text(&self, text: &str) -> Result<bool> {
        let text_json = serde_json::to_string(text)?;
        let js = format!(
            "(function() {{ return !!document.body && document.body.innerText.includes({text_json}); }})()"
        );
        Ok(self.eval(&js).await?.as_bool().unwrap_or(false))
    }

    async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>> {
        let options = self
            .eval_on(
                selector,
                "const el = els[0];
                if (!el || !el.options) return null;
                return Array.from(el.options).map(o => ({ text: (o.text || '').trim(), value: o.value || '' }));",
            )
            .await?;

        if options.is_null() {
            return Err(missing(selector));
        }
        Ok(serde_json::from_value(options)?)
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        let value_json = serde_json::to_string(value)?;
        let body = format!(
            "const el = els[0];
            if (!el || el.tagName !== 'SELECT') return false;
            const v = {value_json};
            if (!Array.from(el.options).some(o => o.value === v)) return false;
            el.value = v;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;"
        );

        if !self.eval_on(selector, &body).await?.as_bool().unwrap_or(false) {
            return Err(PortalError::general(format!(
                "No option with value '{}' in '{}'",
                value, selector
            )));
        }
        Ok(())
    }

    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<()> {
        let path = std::fs::canonicalize(path)?;

        // Resolve the element as a remote object, DOM.setFileInputFiles needs a handle
        let result = self
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": element_script(selector, "return els[0] || null;")?,
                    "returnByValue": false
                }),
            )
            .await?;

        let object_id = result
            .pointer("/result/objectId")
            .and_then(Value::as_str)
            .ok_or_else(|| missing(selector))?;

        self.send(
            "DOM.setFileInputFiles",
            json!({
                "files": [path.display().to_string()],
                "objectId": object_id
            }),
        )
        .await?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        let html = self.eval("document.documentElement.outerHTML").await?;
        Ok(html.as_str().unwrap_or_default().to_string())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self.eval("document.location.href").await?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        let result = self.send("Network.getAllCookies", json!({})).await?;
        let cookies = result.get("cookies").cloned().unwrap_or(json!([]));
        Ok(serde_json::from_value(cookies)?)
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let metrics = self.send("Page.getLayoutMetrics", json!({})).await?;

        let content_size = metrics
            .get("cssContentSize")
            .or_else(|| metrics.get("contentSize"));
        let dimension = |key: &str, fallback: f64| {
            content_size
                .and_then(|size| size.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(fallback)
        };

        let result = self
            .send(
                "Page.captureScreenshot",
                json!({
                    "format": "png",
                    "clip": {
                        "x": 0,
                        "y": 0,
                        "width": dimension("width", 1920.0),
                        "height": dimension("height", 1080.0),
                        "scale": 1
                    },
                    "captureBeyondViewport": true
                }),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| PortalError::general("No screenshot data"))?;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| PortalError::general(format!("Failed to decode screenshot: {}", e)))
    }
}

fn element_script(selector: &str, body: &str) -> Result<String> {
    let selector_json = serde_json::to_string(selector)?;
    Ok([
        "(function() {",
        FIND_ALL_JS,
        &format!("const els = __findAll({selector_json});"),
        body,
        "})()",
    ]
    .join("\n"))
}

fn missing(selector: &str) -> PortalError {
    PortalError::ElementNotFound {
        selector: selector.to_string(),
        context: "no match when queried".to_string(),
        html: String::new(),
    }
}

async fn write_command(socket: &mut CdpSocket, id: u64, method: &str, params: Value) -> Result<()> {
    let cmd = json!({ "id": id, "method": method, "params": params });
    socket
        .send(Message::Text(cmd.to_string().into()))
        .await
        .map_err(|e| PortalError::CdpConnectionFailed(format!("Failed to send {}: {}", method, e)))
}

/// Next JSON frame, `None` for non-text frames
async fn read_frame(socket: &mut CdpSocket) -> Result<Option<Value>> {
    match socket.next().await {
        Some(Ok(Message::Text(text))) => Ok(Some(serde_json::from_str(text.as_str())?)),
        Some(Ok(Message::Close(_))) | None => Err(PortalError::CdpConnectionFailed(
            "CDP connection closed".to_string(),
        )),
        Some(Ok(_)) => Ok(None),
        Some(Err(e)) => Err(PortalError::CdpConnectionFailed(format!(
            "WebSocket error: {}",
            e
        ))),
    }
}

fn command_result(method: &str, response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        return Err(PortalError::CdpConnectionFailed(format!(
            "{} failed: {}",
            method, error
        )));
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}
