//! LanceDB implementation of the `VectorStore` contract.
//!
//! One store maps to one named table (the collection). The table is created
//! lazily on first upsert with an empty batch, so a fresh database needs no
//! setup step. Writes go through `merge_insert` keyed on `id`, which gives
//! insert-or-replace semantics in a single call.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;

use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};

use ragdb_core::traits::VectorStore;
use ragdb_core::types::{IndexedDocument, Metadata, QueryMatch};

use crate::schema::build_schema;

pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
    dim: i32,
}

impl LanceVectorStore {
    pub async fn connect(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let db = connect(uri).execute().await?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            dim: dim as i32,
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self.db.table_names().execute().await?;
        Ok(names.contains(&self.table_name))
    }

    async fn ensure_table(&self) -> Result<()> {
        if self.table_exists().await? {
            return Ok(());
        }
        let schema = build_schema(self.dim);
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.db
            .create_table(&self.table_name, Box::new(iter))
            .execute()
            .await?;
        tracing::info!(table = %self.table_name, "created collection");
        Ok(())
    }

    fn to_record_batch(&self, documents: &[IndexedDocument]) -> Result<RecordBatch> {
        let schema = build_schema(self.dim);
        let mut ids = Vec::with_capacity(documents.len());
        let mut texts = Vec::with_capacity(documents.len());
        let mut metadatas = Vec::with_capacity(documents.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(documents.len());
        for doc in documents {
            if doc.embedding.len() as i32 != self.dim {
                return Err(anyhow!(
                    "embedding dimension {} does not match collection dimension {}",
                    doc.embedding.len(),
                    self.dim
                ));
            }
            ids.push(doc.id.clone());
            texts.push(doc.text.clone());
            metadatas.push(serde_json::to_string(&doc.metadata)?);
            vectors.push(Some(doc.embedding.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadatas)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors.into_iter(), self.dim)),
            ],
        )?;
        Ok(batch)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not Utf8"))
}

fn parse_metadata(raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.ensure_table().await?;
        let batch = self.to_record_batch(documents)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await?;
        tracing::debug!(table = %self.table_name, count = documents.len(), "upserted documents");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table.vector_search(vector.to_vec())?.limit(k).execute().await?;
        // LanceDB also returns a `_distance` column; the engine layers its
        // rank-derived score on top, so the native metric is not surfaced.
        let mut matches = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let id_col = string_column(&batch, "id")?;
            let text_col = string_column(&batch, "text")?;
            let meta_col = string_column(&batch, "metadata")?;
            for i in 0..batch.num_rows() {
                matches.push(QueryMatch {
                    id: id_col.value(i).to_string(),
                    text: text_col.value(i).to_string(),
                    metadata: parse_metadata(meta_col.value(i)),
                });
            }
        }
        matches.truncate(k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() || !self.table_exists().await? {
            return Ok(());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let quoted: Vec<String> = ids
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect();
        table
            .delete(&format!("id IN ({})", quoted.join(", ")))
            .await?;
        tracing::debug!(table = %self.table_name, count = ids.len(), "deleted documents");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        Ok(table.count_rows(None).await?)
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut ids = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let id_col = string_column(&batch, "id")?;
            for i in 0..batch.num_rows() {
                ids.push(id_col.value(i).to_string());
            }
        }
        Ok(ids)
    }
}
