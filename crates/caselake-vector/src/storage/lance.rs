//! LanceDB-backed pair storage.
//!
//! Rows live in one of two buffer tables, `<table>_<dim>_a` and
//! `<table>_<dim>_b`. A save rewrites the inactive buffer and then flips the
//! `active_table:<table>` row of the `meta` table, so a reader always sees
//! one fully written buffer. That row carries both the buffer name and the
//! dimension and is written by a single upsert.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use caselake_core::types::IndexedRecord;
use caselake_core::{Error, Result};

use super::IndexStorage;
use crate::schema::build_chunks_schema;
use crate::snapshot::IndexSnapshot;

const META_TABLE: &str = "meta";

async fn has_table(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// The buffer readers should use, as recorded in the meta table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivePointer {
    table: String,
    dimension: usize,
}

impl ActivePointer {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("key", DataType::Utf8, false),
            Field::new("buffer", DataType::Utf8, false),
            Field::new("dimension", DataType::Int64, false),
            Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        ]))
    }

    async fn read(conn: &Connection, key: &str) -> anyhow::Result<Option<Self>> {
        if !has_table(conn, META_TABLE).await? {
            return Ok(None);
        }
        let t = conn.open_table(META_TABLE).execute().await?;
        let filter = format!("key = '{}'", key.replace('\'', "''"));
        let mut stream = t.query().only_if(filter).limit(1).execute().await?;
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            if batch.num_rows() == 0 {
                continue;
            }
            let buffer = batch
                .column_by_name("buffer")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("meta.buffer column missing"))?;
            let dimension = batch
                .column_by_name("dimension")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow!("meta.dimension column missing"))?;
            let dimension = usize::try_from(dimension.value(0))
                .map_err(|_| anyhow!("meta row for {} has a negative dimension", key))?;
            return Ok(Some(Self { table: buffer.value(0).to_string(), dimension }));
        }
        Ok(None)
    }

    async fn write(&self, conn: &Connection, key: &str) -> anyhow::Result<()> {
        let row = RecordBatch::try_new(Self::schema(), vec![
            Arc::new(StringArray::from(vec![key])),
            Arc::new(StringArray::from(vec![self.table.as_str()])),
            Arc::new(Int64Array::from(vec![self.dimension as i64])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ])?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(row)].into_iter(), Self::schema()));
        if !has_table(conn, META_TABLE).await? {
            conn.create_table(META_TABLE, reader).execute().await?;
            return Ok(());
        }
        let t = conn.open_table(META_TABLE).execute().await?;
        let mut upsert = t.merge_insert(&["key"]);
        upsert.when_matched_update_all(None).when_not_matched_insert_all();
        upsert.execute(reader).await?;
        Ok(())
    }
}

pub struct LanceStorage {
    uri: PathBuf,
    table: String,
    rt: Runtime,
    conn: Connection,
}

fn storage_err(e: anyhow::Error) -> Error {
    Error::Storage(format!("{:#}", e))
}

impl LanceStorage {
    pub fn open(uri: &Path, table: &str) -> Result<Self> {
        std::fs::create_dir_all(uri)?;
        let rt = Runtime::new()?;
        let conn = rt
            .block_on(async { connect(&uri.to_string_lossy()).execute().await })
            .map_err(|e| Error::Storage(format!("cannot open lance database at {}: {}", uri.display(), e)))?;
        Ok(Self { uri: uri.to_path_buf(), table: table.to_string(), rt, conn })
    }

    fn pointer_key(&self) -> String { format!("active_table:{}", self.table) }

    fn buffer_name(&self, dim: usize, slot: char) -> String { format!("{}_{}_{}", self.table, dim, slot) }

    async fn active(&self) -> anyhow::Result<Option<ActivePointer>> {
        ActivePointer::read(&self.conn, &self.pointer_key()).await
    }

    async fn load_async(&self) -> anyhow::Result<Option<IndexSnapshot>> {
        let Some(pointer) = self.active().await? else { return Ok(None) };
        if !has_table(&self.conn, &pointer.table).await? {
            warn!(table = %pointer.table, "active buffer table is missing; treating index as absent");
            return Ok(None);
        }
        let t = self.conn.open_table(&pointer.table).execute().await?;
        let total = t.count_rows(None).await?;
        let mut rows: Vec<(i64, IndexedRecord, Option<Vec<f32>>)> = Vec::with_capacity(total);
        if total > 0 {
            let mut stream = t.query().limit(total).execute().await?;
            while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
                read_rows(&batch, &mut rows)?;
            }
        }
        rows.sort_by_key(|(position, _, _)| *position);

        let mut snapshot = IndexSnapshot::empty(pointer.dimension);
        for (position, record, vector) in rows {
            match vector {
                Some(v) if v.len() == pointer.dimension => snapshot.vectors.extend_from_slice(&v),
                _ => warn!(position, table = %pointer.table, "row has no usable vector"),
            }
            snapshot.records.push(record);
        }
        Ok(Some(snapshot))
    }

    async fn save_async(&self, snapshot: &IndexSnapshot) -> anyhow::Result<()> {
        let slot = match self.active().await? {
            Some(p) if p.table == self.buffer_name(snapshot.dimension, 'a') => 'b',
            _ => 'a',
        };
        let target = self.buffer_name(snapshot.dimension, slot);
        let schema = build_chunks_schema(snapshot.dimension);

        if has_table(&self.conn, &target).await? {
            let t = self.conn.open_table(&target).execute().await?;
            t.delete("true").await?;
            if !snapshot.records.is_empty() {
                let reader = Box::new(RecordBatchIterator::new(vec![Ok(to_record_batch(snapshot)?)].into_iter(), schema));
                t.add(reader).execute().await?;
            }
        } else {
            let batches = if snapshot.records.is_empty() { Vec::new() } else { vec![Ok(to_record_batch(snapshot)?)] };
            let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
            self.conn.create_table(&target, reader).execute().await?;
        }

        ActivePointer { table: target.clone(), dimension: snapshot.dimension }
            .write(&self.conn, &self.pointer_key())
            .await?;
        debug!(table = %target, rows = snapshot.records.len(), "activated lance buffer");
        Ok(())
    }
}

fn to_record_batch(snapshot: &IndexSnapshot) -> anyhow::Result<RecordBatch> {
    if !snapshot.is_aligned() {
        return Err(anyhow!(
            "refusing to write {} vectors with {} records",
            snapshot.vector_count(),
            snapshot.records.len()
        ));
    }
    let n = snapshot.records.len();
    let positions: Vec<i64> = (0..n as i64).collect();
    let texts: Vec<&str> = snapshot.records.iter().map(|r| r.text.as_str()).collect();
    let sources: Vec<&str> = snapshot.records.iter().map(|r| r.source.as_str()).collect();
    let vectors = (0..n).map(|i| Some(snapshot.vector(i).iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(build_chunks_schema(snapshot.dimension), vec![
        Arc::new(Int64Array::from(positions)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(sources)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, snapshot.dimension as i32)),
    ])?;
    Ok(batch)
}

fn read_rows(batch: &RecordBatch, out: &mut Vec<(i64, IndexedRecord, Option<Vec<f32>>)>) -> anyhow::Result<()> {
    let positions = batch
        .column_by_name("position")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("position column missing"))?;
    let texts = batch
        .column_by_name("text")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("text column missing"))?;
    let sources = batch
        .column_by_name("source")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("source column missing"))?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;
    for i in 0..batch.num_rows() {
        let vector = if vectors.is_null(i) {
            None
        } else {
            let item = vectors.value(i);
            item.as_any().downcast_ref::<Float32Array>().map(|a| a.values().to_vec())
        };
        let record = IndexedRecord { text: texts.value(i).to_string(), source: sources.value(i).to_string() };
        out.push((positions.value(i), record, vector));
    }
    Ok(())
}

impl IndexStorage for LanceStorage {
    fn describe(&self) -> String { format!("{} (table {})", self.uri.display(), self.table) }

    fn load(&self) -> Result<Option<IndexSnapshot>> {
        self.rt.block_on(self.load_async()).map_err(storage_err)
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        self.rt.block_on(self.save_async(snapshot)).map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_upsert_keeps_one_row_per_key() {
        let tmp = tempfile::TempDir::new().unwrap();
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let conn = connect(&tmp.path().to_string_lossy()).execute().await.unwrap();
            assert_eq!(ActivePointer::read(&conn, "active_table:chunks").await.unwrap(), None);

            let first = ActivePointer { table: "chunks_8_a".into(), dimension: 8 };
            first.write(&conn, "active_table:chunks").await.unwrap();
            let second = ActivePointer { table: "chunks_16_b".into(), dimension: 16 };
            second.write(&conn, "active_table:chunks").await.unwrap();
            let other = ActivePointer { table: "notes_8_a".into(), dimension: 8 };
            other.write(&conn, "active_table:notes").await.unwrap();

            assert_eq!(ActivePointer::read(&conn, "active_table:chunks").await.unwrap(), Some(second));
            assert_eq!(ActivePointer::read(&conn, "active_table:notes").await.unwrap(), Some(other));
            let meta = conn.open_table(META_TABLE).execute().await.unwrap();
            assert_eq!(meta.count_rows(None).await.unwrap(), 2);
        });
    }
}
