pub mod elastic;
mod page;
pub mod scroll;

use async_trait::async_trait;

use crate::error::EtlError;

pub use self::elastic::ElasticSource;
pub use self::page::{Hit, Page, parse_page};
pub use self::scroll::{Scroll, ScrollState, collect_pages};

/// A store of named document collections that can be paged through with a cursor.
///
/// The first `fetch_page` call for an index passes no cursor; every following
/// call passes only the cursor returned by the previous page. An empty page
/// means the index is exhausted.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Names of every index in the catalog, sorted
    async fn list_units(&self) -> Result<Vec<String>, EtlError>;

    async fn fetch_page(&self, unit: &str, cursor: Option<&str>) -> Result<Page, EtlError>;

    /// Release a cursor that will not be used again. Failures are only logged.
    async fn release(&self, _cursor: &str) {}
}
