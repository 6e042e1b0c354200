//! Fetch layer: the fetch-until-empty page loop and the upstream review sources it drives.

mod error;
mod fetcher;
mod source;

#[cfg(feature = "http")]
pub mod http;

pub use error::FetchError;
pub use fetcher::{FetchEvent, FetchOutcome, Fetcher, StopReason};
pub use source::{Page, PageSource};
pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "http")]
pub use http::{GraphqlPageSource, RestPageSource};
