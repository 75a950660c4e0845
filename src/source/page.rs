use serde_json::{Map, Value};

/// A single search hit: the Elasticsearch-assigned `_id` and the `_source` payload
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Map<String, Value>,
}

impl Hit {
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// One page of a scroll: its hits and the cursor for the next request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub hits: Vec<Hit>,
    pub cursor: Option<String>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Parse a search or scroll response body into a [`Page`]
pub fn parse_page(response: &Value) -> Result<Page, String> {
    let hits = response["hits"]["hits"]
        .as_array()
        .ok_or_else(|| "response has no hits.hits array".to_string())?;

    let cursor = response
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let hits = hits
        .iter()
        .enumerate()
        .map(|(position, hit)| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("hit {} has no _id", position))?;
            // Indices with _source disabled return hits without a payload
            let source = match hit.get("_source") {
                Some(Value::Object(map)) => map.clone(),
                Some(Value::Null) | None => Map::new(),
                Some(other) => {
                    return Err(format!(
                        "hit '{}' has a non-object _source: {}",
                        id, other
                    ));
                }
            };
            Ok(Hit::new(id, source))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page { hits, cursor })
}
