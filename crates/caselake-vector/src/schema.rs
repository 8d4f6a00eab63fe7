//! Arrow schemas for the LanceDB backend.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// One row per indexed chunk. `position` is the insertion order and keeps
/// rows aligned with the file backend's ordering after a round trip.
pub fn build_chunks_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("position", DataType::Int64, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}
