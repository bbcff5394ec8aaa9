use serde_json::Value;

use crate::http_error::{client, endpoint, parse_json_response, ProviderHttpError};

const PROVIDER: &str = "serp";

/// SerpAPI Google search, reduced to the organic result snippets.
pub struct SerpSearchClient {
    http: reqwest::Client,
    url_search: String,
}

impl SerpSearchClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: client(timeout_ms)?,
            url_search: endpoint(base_url, "search.json"),
        })
    }

    pub async fn snippets(&self, query: &str, api_key: &str) -> anyhow::Result<Vec<String>> {
        let url = &self.url_search;
        tracing::debug!(
            target: "forgetube.provider",
            stage = "serp.search.in",
            url = %url,
            query_len = query.len()
        );
        let resp = self
            .http
            .get(url)
            .query(&[("q", query), ("hl", "en"), ("gl", "us"), ("api_key", api_key)])
            .send()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        let v = parse_json_response(PROVIDER, resp).await?;
        let snippets = organic_snippets(&v);
        tracing::debug!(
            target: "forgetube.provider",
            stage = "serp.search.out",
            snippets = snippets.len()
        );
        Ok(snippets)
    }
}

fn organic_snippets(v: &Value) -> Vec<String> {
    v.get("organic_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r.get("snippet").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_snippets_skip_results_without_snippet() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "ocean tides".into()),
                Matcher::UrlEncoded("hl".into(), "en".into()),
                Matcher::UrlEncoded("gl".into(), "us".into()),
                Matcher::UrlEncoded("api_key".into(), "serp-key".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "organic_results": [
                        { "title": "a", "snippet": "The moon pulls." },
                        { "title": "b" },
                        { "title": "c", "snippet": "Two tides a day." }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = SerpSearchClient::new(&server.url(), 5_000).unwrap();
        let snippets = client.snippets("ocean tides", "serp-key").await.unwrap();
        assert_eq!(snippets, vec!["The moon pulls.", "Two tides a day."]);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_results_is_empty() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = SerpSearchClient::new(&server.url(), 5_000).unwrap();
        assert!(client.snippets("x", "k").await.unwrap().is_empty());
    }
}
