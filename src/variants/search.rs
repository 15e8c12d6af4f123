//! Access to the paginated search backend holding the variant indices.

use async_trait::async_trait;

use crate::err::PipelineError;

/// One conjunct of the filter of a search request.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCriterion {
    /// Exact match on a keyword field.
    Term { field: String, value: String },
    /// Inclusive range on an integer field.
    Range { field: String, gte: i64, lte: i64 },
    /// Integer field strictly greater than `value`.
    GreaterThan { field: String, value: i64 },
}

impl FilterCriterion {
    /// Render as Elasticsearch query clause.
    pub fn to_query(&self) -> serde_json::Value {
        match self {
            FilterCriterion::Term { field, value } => {
                serde_json::json!({ "term": { field.as_str(): value } })
            }
            FilterCriterion::Range { field, gte, lte } => {
                serde_json::json!({ "range": { field.as_str(): { "gte": gte, "lte": lte } } })
            }
            FilterCriterion::GreaterThan { field, value } => {
                serde_json::json!({ "range": { field.as_str(): { "gt": value } } })
            }
        }
    }
}

/// A search against one index; hits are returned sorted ascending by `sort`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub filters: Vec<FilterCriterion>,
    pub source_fields: Vec<String>,
    /// Sort fields, all ascending; the last one must make the order total.
    pub sort: Vec<String>,
    /// Maximal number of hits per page.
    pub page_size: usize,
}

impl SearchRequest {
    /// Build the JSON body for one page, continuing after `search_after`.
    pub fn to_body(&self, search_after: Option<&[serde_json::Value]>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "size": self.page_size,
            "_source": self.source_fields,
            "query": {
                "bool": {
                    "filter": self.filters.iter().map(FilterCriterion::to_query).collect::<Vec<_>>(),
                },
            },
            "sort": self
                .sort
                .iter()
                .map(|field| serde_json::json!({ field.as_str(): { "order": "asc" } }))
                .collect::<Vec<_>>(),
        });
        if let Some(search_after) = search_after {
            body["search_after"] = serde_json::Value::Array(search_after.to_vec());
        }
        body
    }
}

/// One hit: the requested `_source` fields and the sort values for paging.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
    #[serde(default)]
    pub sort: Vec<serde_json::Value>,
}

/// Interface to the search service; returns at most `page_size` hits per call.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search_page(
        &self,
        request: &SearchRequest,
        search_after: Option<&[serde_json::Value]>,
    ) -> Result<Vec<SearchHit>, PipelineError>;
}

/// Fetch all hits for `request`, page by page, until the backend is exhausted.
pub async fn fetch_all_search_results<B>(
    backend: &B,
    request: &SearchRequest,
) -> Result<Vec<serde_json::Value>, PipelineError>
where
    B: SearchBackend + ?Sized,
{
    if request.page_size == 0 {
        return Err(PipelineError::BackendQueryFailure {
            index: request.index.clone(),
            message: "page size must be positive".into(),
        });
    }

    let mut result = Vec::new();
    let mut search_after: Option<Vec<serde_json::Value>> = None;
    let mut pages = 0usize;
    loop {
        let hits = backend
            .search_page(request, search_after.as_deref())
            .await?;
        pages += 1;
        let is_last = hits.len() < request.page_size;
        search_after = hits.last().map(|hit| hit.sort.clone());
        result.extend(hits.into_iter().map(|hit| hit.source));

        if is_last {
            break;
        }
        if search_after.as_ref().map_or(true, |s| s.is_empty()) {
            return Err(PipelineError::BackendQueryFailure {
                index: request.index.clone(),
                message: "full page without sort values, cannot continue".into(),
            });
        }
    }

    tracing::debug!(
        "fetched {} hits from {} in {} page(s)",
        result.len(),
        &request.index,
        pages
    );
    Ok(result)
}

/// Response of the `_search` endpoint, reduced to what we read.
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    hits: SearchResponseHits,
}

#[derive(Debug, serde::Deserialize)]
struct SearchResponseHits {
    hits: Vec<SearchHit>,
}

/// `SearchBackend` talking to an Elasticsearch cluster over HTTP.
#[derive(Debug, Clone)]
pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticsearchBackend {
    /// Construct with the base URL of the cluster, e.g., `http://localhost:9200`.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn search_page(
        &self,
        request: &SearchRequest,
        search_after: Option<&[serde_json::Value]>,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let failure = |message: String| PipelineError::BackendQueryFailure {
            index: request.index.clone(),
            message,
        };

        let url = format!("{}/{}/_search", &self.base_url, &request.index);
        tracing::trace!("POST {}", &url);
        let response = self
            .client
            .post(&url)
            .json(&request.to_body(search_after))
            .send()
            .await
            .map_err(|e| failure(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failure(format!("HTTP {}: {}", status, text)));
        }
        let response: SearchResponse = response
            .json()
            .await
            .map_err(|e| failure(format!("could not decode response: {}", e)))?;
        Ok(response.hits.hits)
    }
}
