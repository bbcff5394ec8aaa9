use async_trait::async_trait;

use forgetube_core::api::{ImageRenderer, RenderError, RenderRequest};

use crate::http_error::{client, endpoint, ensure_success, ProviderHttpError};

const PROVIDER: &str = "image";

/// Diffusion service speaking `POST /render` with a JSON render request and
/// answering with the encoded PNG.
pub struct HttpImageRenderer {
    http: reqwest::Client,
    url_render: String,
}

impl HttpImageRenderer {
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: client(timeout_ms)?,
            url_render: endpoint(base_url, "render"),
        })
    }

    async fn post(&self, request: &RenderRequest) -> anyhow::Result<Vec<u8>> {
        let url = &self.url_render;
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        let resp = ensure_success(PROVIDER, resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ImageRenderer for HttpImageRenderer {
    fn name(&self) -> &str {
        "http-diffusion"
    }

    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        tracing::debug!(
            target: "forgetube.provider",
            stage = "image.render.in",
            width = request.width,
            height = request.height,
            steps = request.steps
        );
        let data = self.post(request).await?;
        if data.is_empty() {
            return Err(RenderError::new("renderer returned an empty image"));
        }
        tracing::debug!(
            target: "forgetube.provider",
            stage = "image.render.out",
            bytes = data.len()
        );
        Ok(data)
    }
}
