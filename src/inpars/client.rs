// client.rs
use crate::config::InParsConfig;
use crate::inpars::fetcher::{Fetcher, ListingFilters, Page, PageRequest};
use crate::inpars::models::{ApiErrorBody, ListingPageBody, RateLimit};
use crate::inpars::FetchError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("listing-watch/", env!("CARGO_PKG_VERSION"));

const MAX_ATTEMPTS: u64 = 3;
const MAX_BACKOFF_SECS: u64 = 10;
const JITTER_MAX_MS: u64 = 1_000;

/// HTTP client for the InPars listings API (`GET /estate`).
pub struct InParsClient {
    client: Client,
    token: String,
    endpoint: Url,
}

impl InParsClient {
    pub fn new(config: &InParsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let endpoint = config
            .base_url
            .join("estate")
            .map_err(|e| FetchError::Malformed(format!("bad endpoint: {e}")))?;

        Ok(Self {
            client,
            token: config.token.clone(),
            endpoint,
        })
    }

    /// Retries transport failures only. HTTP-level rejections (including 429)
    /// come straight back so the cycle can be abandoned without burning quota.
    async fn fetch_with_retry(
        &self,
        query: &[(&'static str, String)],
    ) -> Result<Page, FetchError> {
        let mut attempt = 1;

        loop {
            let start = Instant::now();

            match self.try_fetch(query).await {
                Ok(page) => {
                    debug!(
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        listings = page.listings.len(),
                        "fetched listing page"
                    );
                    return Ok(page);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "listing fetch failed, retrying");

                    let base = std::cmp::min(2 * attempt, MAX_BACKOFF_SECS);
                    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
                    tokio::time::sleep(Duration::from_secs(base) + Duration::from_millis(jitter))
                        .await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self, query: &[(&'static str, String)]) -> Result<Page, FetchError> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .basic_auth(&self.token, None::<&str>)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        parse_response(status, &text)
    }
}

#[async_trait]
impl Fetcher for InParsClient {
    async fn fetch_page(
        &self,
        filters: &ListingFilters,
        request: &PageRequest,
    ) -> Result<Page, FetchError> {
        let query = filters.query_pairs(request);
        self.fetch_with_retry(&query).await
    }
}

fn parse_response(status: StatusCode, text: &str) -> Result<Page, FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited(
            api_message(text).unwrap_or_else(|| "HTTP 429".to_string()),
        ));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Auth(
            api_message(text).unwrap_or_else(|| format!("HTTP {status}")),
        ));
    }

    if !status.is_success() {
        return Err(FetchError::Api {
            status: status.as_u16(),
            message: api_message(text).unwrap_or_else(|| text.chars().take(200).collect()),
        });
    }

    let body: ListingPageBody =
        serde_json::from_str(text).map_err(|e| FetchError::Malformed(e.to_string()))?;

    Ok(Page {
        rate_limit: RateLimit::from(&body.meta),
        listings: body.data,
    })
}

fn api_message(text: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(text)
        .ok()
        .map(|body| body.message)
        .filter(|message| !message.is_empty())
}
