use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Default table (collection) name, matching the knowledge-base domain.
pub const DEFAULT_TABLE: &str = "knowledge_base";

/// Arrow schema for one collection. `metadata` is a JSON-encoded object;
/// `dim` is fixed per collection by the embedding model behind it.
pub fn build_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}
