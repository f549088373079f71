//! [NewsCatcher](https://newscatcherapi.com) v2 search client.
//!
//! The search endpoint is queried with `q`, `lang`, `page` and `page_size`,
//! authenticated by an `x-api-key` header. Only the fields the report uses
//! are decoded; `null` values become empty strings.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{ArticleSource, SearchRequest};
use crate::error::FetchError;
use crate::models::Article;
use crate::utils::truncate_for_log;

pub const DEFAULT_ENDPOINT: &str = "https://api.newscatcherapi.com/v2/search";

/// HTTP client for the NewsCatcher search endpoint.
#[derive(Debug, Clone)]
pub struct NewsCatcherClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl NewsCatcherClient {
    pub fn new(endpoint: &Url, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("press_summary_report/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.clone(),
            api_key: api_key.to_string(),
        })
    }
}

impl ArticleSource for NewsCatcherClient {
    #[instrument(level = "info", skip_all, fields(query = %request.query, lang = %request.language, page = request.page))]
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<Article>, FetchError> {
        let t0 = Instant::now();
        let page_no = request.page.to_string();
        let page_size = request.page_size.to_string();

        let response = self
            .http
            .get(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .query(&[
                ("q", request.query.as_str()),
                ("lang", request.language.as_str()),
                ("page", page_no.as_str()),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(%status, elapsed_ms = t0.elapsed().as_millis(), "Search provider rejected request");
            return Err(FetchError::Status {
                status,
                body: truncate_for_log(&body, 300),
            });
        }

        let page: SearchResponse = serde_json::from_str(&body)?;
        let articles: Vec<Article> = page.articles.into_iter().map(Article::from).collect();

        info!(
            count = articles.len(),
            total_hits = ?page.total_hits,
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched articles"
        );
        debug!(titles = ?articles.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(), "Fetched titles");
        Ok(articles)
    }
}

/// Top-level search response.
///
/// NewsCatcher answers "no matches" with `status: "No matches for your search."`
/// and no `articles` key at all.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_hits: Option<u64>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    clean_url: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl From<RawArticle> for Article {
    fn from(raw: RawArticle) -> Self {
        Article {
            title: raw.title.unwrap_or_default(),
            author: raw.author.unwrap_or_default(),
            source: raw.clean_url.unwrap_or_default(),
            published_date: raw.published_date.unwrap_or_default(),
            summary: raw.summary.unwrap_or_default(),
            link: raw.link.unwrap_or_default(),
        }
    }
}
