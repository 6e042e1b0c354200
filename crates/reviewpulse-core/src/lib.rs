pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod schema;
pub mod text;

pub use aggregate::{MonthSummary, Overview, WordCount, overview, summarize, summarize_with};
pub use config::{ClassifyConfig, FetchConfig, NormalizeConfig, PipelineConfig, SummaryConfig};
pub use error::CoreError;
pub use model::{ClassifiedReview, Label, RawRecord, Review, SnapshotRecord};
pub use normalize::{DropCounts, DropReason, Normalized, Normalizer, normalize, parse_date};
