use serde_json::Value;
use std::{error::Error as StdError, fmt};

pub(crate) const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderHttpErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl ProviderHttpErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderHttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure talking to a provider. The URL is stored with any `key` /
/// `api_key` query value masked, so the error can be logged as is.
#[derive(Debug)]
pub struct ProviderHttpError {
    provider: &'static str,
    kind: ProviderHttpErrorKind,
    status: Option<u16>,
    url: Option<String>,
    message: String,
    source: Option<anyhow::Error>,
}

impl ProviderHttpError {
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn kind(&self) -> ProviderHttpErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error, url: &str) -> Self {
        let kind = if err.is_timeout() {
            ProviderHttpErrorKind::Timeout
        } else if err.is_connect() {
            ProviderHttpErrorKind::Connect
        } else if err.is_request() {
            ProviderHttpErrorKind::Request
        } else if err.is_body() {
            ProviderHttpErrorKind::Body
        } else if err.is_decode() {
            ProviderHttpErrorKind::Decode
        } else {
            ProviderHttpErrorKind::Unknown
        };
        let status = err.status().map(|s| s.as_u16());
        // reqwest puts the full URL in its message; drop it, we carry a masked copy.
        let err = err.without_url();
        let message = err.to_string();
        ProviderHttpError {
            provider,
            kind,
            status,
            url: Some(mask_url(url)),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }

    pub(crate) fn status_error(
        provider: &'static str,
        status: u16,
        url: &str,
        preview: String,
    ) -> Self {
        ProviderHttpError {
            provider,
            kind: ProviderHttpErrorKind::Status,
            status: Some(status),
            url: Some(mask_url(url)),
            message: preview,
            source: None,
        }
    }

    pub(crate) fn decode_error(
        provider: &'static str,
        status: u16,
        url: &str,
        err: serde_json::Error,
        preview: String,
    ) -> Self {
        let message = format!("failed to decode response body: {} | body={}", err, preview);
        ProviderHttpError {
            provider,
            kind: ProviderHttpErrorKind::Decode,
            status: Some(status),
            url: Some(mask_url(url)),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }

    /// Well-formed response that lacks the field we need.
    pub(crate) fn shape_error(provider: &'static str, url: &str, message: String) -> Self {
        ProviderHttpError {
            provider,
            kind: ProviderHttpErrorKind::Decode,
            status: None,
            url: Some(mask_url(url)),
            message,
            source: None,
        }
    }
}

impl fmt::Display for ProviderHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} http error kind={}", self.provider, self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={}", status)?;
        }
        if let Some(url) = &self.url {
            write!(f, " url={}", url)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl StdError for ProviderHttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

const SECRET_PARAMS: [&str; 2] = ["key", "api_key"];

pub(crate) fn mask_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let masked: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if SECRET_PARAMS.contains(&name) => format!("{name}=***"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", base, masked.join("&"))
}

pub(crate) fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

pub(crate) async fn parse_json_response(
    provider: &'static str,
    resp: reqwest::Response,
) -> anyhow::Result<Value> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| ProviderHttpError::from_reqwest(provider, err, &url))?;

    if !status.is_success() {
        let preview = preview_body(&body);
        return Err(ProviderHttpError::status_error(provider, status.as_u16(), &url, preview).into());
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(&body).map_err(|err| {
        let preview = preview_body(&body);
        ProviderHttpError::decode_error(provider, status.as_u16(), &url, err, preview).into()
    })
}

/// Returns the response unchanged on 2xx, otherwise a status error carrying a
/// preview of the body.
pub(crate) async fn ensure_success(
    provider: &'static str,
    resp: reqwest::Response,
) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| ProviderHttpError::from_reqwest(provider, err, &url))?;
    let preview = preview_body(&body);
    Err(ProviderHttpError::status_error(provider, status.as_u16(), &url, preview).into())
}

pub(crate) fn client(timeout_ms: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()?)
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_preview_body_empty() {
        assert_eq!(preview_body("   "), "<empty body>");
    }

    #[test]
    fn test_preview_body_truncates() {
        let body = "a".repeat(BODY_PREVIEW_LIMIT + 10);
        let preview = preview_body(&body);
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= BODY_PREVIEW_LIMIT + 3);
    }

    #[test]
    fn test_mask_url_hides_keys() {
        assert_eq!(
            mask_url("https://x.test/search.json?q=tides&api_key=s3cret&hl=en"),
            "https://x.test/search.json?q=tides&api_key=***&hl=en"
        );
        assert_eq!(
            mask_url("https://x.test/v1/models/m:generateContent?key=abc"),
            "https://x.test/v1/models/m:generateContent?key=***"
        );
        assert_eq!(mask_url("http://x.test/render"), "http://x.test/render");
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        assert_eq!(endpoint("http://h:1/", "/render"), "http://h:1/render");
        assert_eq!(endpoint("http://h:1", "render"), "http://h:1/render");
    }

    #[test]
    fn test_status_error_display() {
        let err = ProviderHttpError::status_error(
            "serp",
            502,
            "https://serpapi.com/search.json?api_key=top",
            "bad gateway".to_string(),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("serp http error kind=status"));
        assert!(msg.contains("status=502"));
        assert!(msg.contains("api_key=***"));
        assert!(!msg.contains("top"));
        assert!(msg.contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_parse_json_response_status_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/thing")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let resp = reqwest::get(format!("{}/thing", server.url())).await.unwrap();
        let err = parse_json_response("test", resp).await.unwrap_err();
        let http = err.downcast_ref::<ProviderHttpError>().unwrap();
        assert_eq!(http.kind(), ProviderHttpErrorKind::Status);
        assert_eq!(http.status(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_parse_json_response_decode_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/thing")
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let resp = reqwest::get(format!("{}/thing", server.url())).await.unwrap();
        let err = parse_json_response("test", resp).await.unwrap_err();
        let http = err.downcast_ref::<ProviderHttpError>().unwrap();
        assert_eq!(http.kind(), ProviderHttpErrorKind::Decode);
    }
}
