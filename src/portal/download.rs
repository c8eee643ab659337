use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};

use crate::browser::BrowserCookie;
use crate::error::{PortalError, Result};

/// Authenticated fetch of the generated certificate.
///
/// The download link is not authenticated by the automation layer, so the
/// caller forwards the browser's cookies as a raw `Cookie` header.
#[async_trait]
pub trait CertificateDownloader: Send + Sync {
    async fn download(&self, url: &str, cookie_header: &str) -> Result<Vec<u8>>;
}

/// `name=value;` for every cookie, in the order the browser reports them.
pub fn cookie_header(cookies: &[BrowserCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={};", c.name, c.value))
        .collect()
}

/// Absolute download URL from the page the link was found on.
pub fn download_url(current_url: &str, href: &str) -> Result<String> {
    let base = reqwest::Url::parse(current_url).map_err(|e| {
        PortalError::general(format!("Invalid page URL '{}': {}", current_url, e))
    })?;
    let url = base.join(href).map_err(|e| {
        PortalError::general(format!("Invalid download link '{}': {}", href, e))
    })?;
    Ok(url.to_string())
}

/// `reqwest` downloader sharing the browser's TLS leniency and language.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(language: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(language)
                .map_err(|e| PortalError::Config(format!("Invalid language: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CertificateDownloader for HttpDownloader {
    async fn download(&self, url: &str, cookie_header: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(COOKIE, cookie_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::general(format!(
                "Certificate download failed with HTTP {}",
                status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> (u16, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(body).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });

        (port, rx)
    }

    #[test]
    fn cookie_header_joins_every_cookie() {
        let cookies = vec![
            BrowserCookie {
                name: "myacinfo".to_string(),
                value: "abc".to_string(),
            },
            BrowserCookie {
                name: "dslang".to_string(),
                value: "US-EN".to_string(),
            },
        ];
        assert_eq!(cookie_header(&cookies), "myacinfo=abc;dslang=US-EN;");
        assert_eq!(cookie_header(&[]), "");
    }

    #[test]
    fn download_url_combines_host_and_relative_href() {
        let url = download_url(
            "https://developer.apple.com/account/ios/certificate/certificateCreate.action?formID=1",
            "/account/ios/certificate/certificateContentDownload.action?certificateId=X",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://developer.apple.com/account/ios/certificate/certificateContentDownload.action?certificateId=X"
        );
    }

    #[test]
    fn download_url_keeps_absolute_href() {
        let url = download_url("https://developer.apple.com/a", "https://cdn.example.com/c.cer").unwrap();
        assert_eq!(url, "https://cdn.example.com/c.cer");
    }

    #[test]
    fn download_url_rejects_unparsable_page_url() {
        let err = download_url("not a url", "/c.cer").unwrap_err();
        assert!(matches!(err, PortalError::General(_)));
    }

    #[tokio::test]
    async fn forwards_cookie_and_language_headers() {
        let (port, request) = serve_once("200 OK", b"CERTBYTES").await;
        let downloader = HttpDownloader::new("en").unwrap();

        let body = downloader
            .download(
                &format!("http://127.0.0.1:{}/download.action", port),
                "myacinfo=abc;dslang=US-EN;",
            )
            .await
            .unwrap();

        assert_eq!(body, b"CERTBYTES");
        let request = request.await.unwrap().to_lowercase();
        assert!(request.contains("cookie: myacinfo=abc;dslang=us-en;"));
        assert!(request.contains("accept-language: en"));
    }

    #[tokio::test]
    async fn non_success_status_is_general_error() {
        let (port, _request) = serve_once("403 Forbidden", b"").await;
        let downloader = HttpDownloader::new("en").unwrap();

        let err = downloader
            .download(&format!("http://127.0.0.1:{}/download.action", port), "")
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::General(msg) if msg.contains("403")));
    }
}
