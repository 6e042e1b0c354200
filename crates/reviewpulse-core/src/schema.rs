/// Arrow schema definitions for persisted review data.
pub mod reviews {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Schema for classified-review snapshots (one row per review).
    pub fn classified_review_schema() -> Schema {
        Schema::new(vec![
            Field::new("title", DataType::Utf8, false),
            Field::new("body", DataType::Utf8, false),
            Field::new("date", DataType::Date32, false),
            Field::new("month", DataType::UInt8, false),
            Field::new("label", DataType::Utf8, false),
            Field::new("confidence", DataType::Float32, false),
            Field::new("id", DataType::Utf8, true),
            Field::new("rating", DataType::UInt8, true),
        ])
    }
}

pub use reviews::classified_review_schema;
