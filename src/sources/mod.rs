//! News-search providers.
//!
//! Every provider implements [`ArticleSource`]: one call, one page of
//! [`Article`] records. A failed call is a [`FetchError`] and is never retried
//! here; an empty page is a successful, empty result.
//!
//! | Provider | Module | Notes |
//! |----------|--------|-------|
//! | NewsCatcher v2 search | [`newscatcher`] | `x-api-key` header, exact-phrase query |

pub mod newscatcher;

use crate::error::FetchError;
use crate::models::Article;

/// Parameters of a single search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Provider query string; quote it for an exact-phrase match.
    pub query: String,
    /// ISO 639-1 language code.
    pub language: String,
    pub page_size: u32,
    /// 1-based page number.
    pub page: u32,
}

impl SearchRequest {
    /// Exact-phrase search for `company`.
    pub fn for_company(company: &str, language: &str) -> Self {
        Self {
            query: format!("\"{company}\""),
            language: language.to_string(),
            page_size: 25,
            page: 1,
        }
    }
}

/// A provider of article records.
pub trait ArticleSource {
    /// Fetch one page of articles matching `request`.
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<Article>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_company_quotes_query() {
        let req = SearchRequest::for_company("S-OIL", "ko");
        assert_eq!(req.query, "\"S-OIL\"");
        assert_eq!(req.language, "ko");
        assert_eq!(req.page_size, 25);
        assert_eq!(req.page, 1);
    }
}
