use std::sync::Arc;

use async_trait::async_trait;
use reviewpulse_core::RawRecord;

use crate::FetchError;

/// One page of raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Source's hint that further pages may exist. Informational only: an
    /// empty page is what ends a fetch.
    pub has_more: bool,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An upstream review listing: given page N, return its records or nothing.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Issue one request for `page`.
    async fn fetch_page(&self, page: u32) -> Result<Page, FetchError>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn fetch_page(&self, page: u32) -> Result<Page, FetchError> {
        (**self).fetch_page(page).await
    }
}
