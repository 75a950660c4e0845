use log::debug;

use super::{DocumentSource, Hit};
use crate::error::EtlError;

/// Position of a scroll over one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollState {
    FirstPage,
    NextPage(String),
    Exhausted,
}

/// Sequential pagination over a single index.
///
/// Holds the only copy of the cursor, so a scroll can never be advanced
/// from two places at once.
pub struct Scroll<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    unit: &'a str,
    state: ScrollState,
    pages: usize,
}

impl<'a, S: DocumentSource + ?Sized> Scroll<'a, S> {
    pub fn new(source: &'a S, unit: &'a str) -> Self {
        Self {
            source,
            unit,
            state: ScrollState::FirstPage,
            pages: 0,
        }
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    /// Fetch the next non-empty page, or `None` once the index is exhausted.
    ///
    /// A failed request ends the scroll; the cursor is released either way.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Hit>>, EtlError> {
        let cursor = match &self.state {
            ScrollState::Exhausted => return Ok(None),
            ScrollState::FirstPage => None,
            ScrollState::NextPage(cursor) => Some(cursor.clone()),
        };

        let result = self.source.fetch_page(self.unit, cursor.as_deref()).await;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.finish(cursor.as_deref()).await;
                return Err(e);
            }
        };

        // The cursor on the latest response supersedes the one we sent
        let latest = page.cursor.clone().or(cursor);

        if page.is_empty() {
            debug!("{}: scroll exhausted after {} pages", self.unit, self.pages);
            self.finish(latest.as_deref()).await;
            return Ok(None);
        }

        self.pages += 1;
        debug!(
            "{}: page {} with {} documents",
            self.unit,
            self.pages,
            page.hits.len()
        );

        self.state = match page.cursor {
            Some(next) => ScrollState::NextPage(next),
            None => {
                // Nothing to continue from, this page is the last one
                self.finish(latest.as_deref()).await;
                ScrollState::Exhausted
            }
        };

        Ok(Some(page.hits))
    }

    async fn finish(&mut self, cursor: Option<&str>) {
        self.state = ScrollState::Exhausted;
        if let Some(cursor) = cursor {
            self.source.release(cursor).await;
        }
    }
}

/// Drain an index, returning its documents grouped by page in fetch order
pub async fn collect_pages<S: DocumentSource + ?Sized>(
    source: &S,
    unit: &str,
) -> Result<Vec<Vec<Hit>>, EtlError> {
    let mut scroll = Scroll::new(source, unit);
    let mut pages = Vec::new();
    while let Some(hits) = scroll.next_page().await? {
        pages.push(hits);
    }
    Ok(pages)
}
