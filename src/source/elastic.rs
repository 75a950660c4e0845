use async_trait::async_trait;
use elasticsearch::{
    ClearScrollParts, Elasticsearch, ScrollParts, SearchParts, cat::CatIndicesParts,
    http::response::Response,
};
use log::{debug, warn};
use serde_json::{Value, json};

use super::{DocumentSource, Page, parse_page};
use crate::config::SourceConfig;
use crate::error::EtlError;

/// [`DocumentSource`] backed by the Elasticsearch scroll API
#[derive(Clone)]
pub struct ElasticSource {
    client: Elasticsearch,
    page_size: usize,
    scroll_ttl: String,
}

impl ElasticSource {
    pub fn new(client: Elasticsearch, config: &SourceConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            scroll_ttl: config.scroll_ttl.clone(),
        }
    }

    async fn read_page(&self, unit: &str, response: Response) -> Result<Page, EtlError> {
        let response = response
            .error_for_status_code()
            .map_err(|e| EtlError::fetch(unit, e))?;

        // Read bytes first to get accurate size
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EtlError::fetch(unit, format!("failed to read response: {}", e)))?;
        debug!("{}: read {} bytes", unit, bytes.len());

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| EtlError::fetch(unit, format!("malformed response: {}", e)))?;

        parse_page(&body).map_err(|reason| EtlError::fetch(unit, reason))
    }
}

#[async_trait]
impl DocumentSource for ElasticSource {
    async fn list_units(&self) -> Result<Vec<String>, EtlError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::None)
            .format("json")
            .send()
            .await
            .map_err(|e| EtlError::Catalog(e.to_string()))?
            .error_for_status_code()
            .map_err(|e| EtlError::Catalog(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| EtlError::Catalog(format!("malformed response: {}", e)))?;

        let entries = body
            .as_array()
            .ok_or_else(|| EtlError::Catalog("expected a JSON array of indices".into()))?;

        let mut names: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.get("index").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        names.sort();

        debug!("Catalog lists {} indices", names.len());
        Ok(names)
    }

    async fn fetch_page(&self, unit: &str, cursor: Option<&str>) -> Result<Page, EtlError> {
        let response = match cursor {
            None => {
                debug!(
                    "{}: initiating scroll search with size {}",
                    unit, self.page_size
                );
                self.client
                    .search(SearchParts::Index(&[unit]))
                    .scroll(&self.scroll_ttl)
                    .body(json!({ "size": self.page_size }))
                    .send()
                    .await
            }
            Some(scroll_id) => {
                debug!("{}: scrolling with ID {}", unit, scroll_id);
                self.client
                    .scroll(ScrollParts::None)
                    .body(json!({
                        "scroll": self.scroll_ttl,
                        "scroll_id": scroll_id
                    }))
                    .send()
                    .await
            }
        };

        let response = response.map_err(|e| EtlError::fetch(unit, e))?;
        self.read_page(unit, response).await
    }

    async fn release(&self, cursor: &str) {
        let clear_response = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [cursor] }))
            .send()
            .await
            .and_then(|response| response.error_for_status_code());

        match clear_response {
            Ok(_) => debug!("Cleared scroll context"),
            Err(e) => warn!("Failed to clear scroll context: {}", e),
        }
    }
}
