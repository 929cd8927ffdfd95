//! HTTP client for the Marketing Miner profilers API.

use crate::error::{MinerError, MinerResult};
use crate::token::TokenResolver;
use crate::types::{ApiEnvelope, Language, SuggestionsType};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Production API base
pub const DEFAULT_API_BASE: &str = "https://profilers-api.marketingminer.com";

const SUGGESTIONS_PATH: &str = "keywords/suggestions";
const SEARCH_VOLUME_PATH: &str = "keywords/search-volume-data";

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
        }
    }

    /// Parse a base URL, falling back to the production API when `None`.
    pub fn from_base(base_url: Option<&str>) -> MinerResult<Self> {
        let base_url = Url::parse(base_url.unwrap_or(DEFAULT_API_BASE))?;
        Ok(Self::new(base_url))
    }
}

/// Query for the keyword suggestions endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionsQuery {
    pub lang: Language,
    pub keyword: Option<String>,
    pub suggestions_type: Option<SuggestionsType>,
    /// Already rendered as `"true"`/`"false"`
    pub with_keyword_data: Option<String>,
}

impl SuggestionsQuery {
    pub fn new(lang: Language, keyword: impl Into<String>) -> Self {
        Self {
            lang,
            keyword: Some(keyword.into()),
            suggestions_type: None,
            with_keyword_data: None,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("lang", self.lang.as_str().to_string())];
        if let Some(keyword) = &self.keyword {
            params.push(("keyword", keyword.clone()));
        }
        if let Some(kind) = self.suggestions_type {
            params.push(("suggestions_type", kind.as_str().to_string()));
        }
        if let Some(flag) = &self.with_keyword_data {
            params.push(("with_keyword_data", flag.clone()));
        }
        params
    }
}

/// Stateless client; one GET per call, no retries.
#[derive(Debug, Clone)]
pub struct MarketingMinerClient {
    client: Client,
    base_url: Url,
    resolver: TokenResolver,
}

impl MarketingMinerClient {
    pub fn new(config: ClientConfig, resolver: TokenResolver) -> MinerResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("marketing-miner-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            resolver,
        })
    }

    /// Client against the production API with the token taken from the environment.
    pub fn from_env(config: ClientConfig) -> MinerResult<Self> {
        Self::new(config, TokenResolver::from_env())
    }

    fn build_url(&self, path: &str) -> MinerResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// GET `path` with `params` plus the resolved `api_token`.
    pub async fn request(&self, path: &str, params: &[(&str, String)]) -> MinerResult<Value> {
        let token = self.resolver.resolve().ok_or(MinerError::CredentialMissing)?;
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("api_token", token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Marketing Miner API returned an error status");
            return Err(MinerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Keyword suggestions for a seed keyword
    pub async fn keyword_suggestions(&self, query: &SuggestionsQuery) -> MinerResult<ApiEnvelope> {
        let value = self.request(SUGGESTIONS_PATH, &query.params()).await?;
        Ok(ApiEnvelope::from_value(value))
    }

    /// Search volume data for a single keyword
    pub async fn search_volume_data(
        &self,
        lang: Language,
        keyword: Option<&str>,
    ) -> MinerResult<ApiEnvelope> {
        let mut params = vec![("lang", lang.as_str().to_string())];
        if let Some(keyword) = keyword {
            params.push(("keyword", keyword.to_string()));
        }
        let value = self.request(SEARCH_VOLUME_PATH, &params).await?;
        Ok(ApiEnvelope::from_value(value))
    }
}
