//! Durable vector index over SQLite.
//!
//! Stores one row per (document, chunk ordinal) with the chunk text and its
//! embedding as a little-endian f32 blob, so the index survives process
//! restarts and re-ingestion replaces rather than appends. Similarity
//! queries are brute-force cosine over all stored vectors.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::errors::{StudyPalError, StudyPalResult};

/// Ingestion metadata persisted alongside a document's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Content hash of the source PDF, hex-encoded.
    pub doc_id: String,
    pub goal: String,
    pub backstory: String,
    pub page_count: usize,
    /// RFC 3339 timestamp of the ingestion.
    pub ingested_at: String,
}

/// One chunk ready for persistence: ordinal position within its document,
/// source text, and the embedding computed for it.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub ordinal: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk with its cosine similarity to the query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub doc_id: String,
    pub ordinal: u32,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub chunk_count: u64,
    pub dimensions: u32,
}

#[derive(Debug)]
pub struct VectorIndex {
    conn: Connection,
    dimensions: u32,
    db_path: PathBuf,
}

impl VectorIndex {
    /// Open (or create) the index at the given path.
    ///
    /// `dimensions` is the fixed vector size of the configured embedding
    /// model; an existing index created with a different size is a fatal
    /// configuration error, not something to silently re-interpret.
    pub fn open(db_path: &Path, dimensions: u32) -> StudyPalResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StudyPalError::IndexUnavailable(format!(
                        "cannot create index directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| {
            StudyPalError::IndexUnavailable(format!(
                "cannot open index at {}: {e}",
                db_path.display()
            ))
        })?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                goal TEXT NOT NULL,
                backstory TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                ingested_at TEXT NOT NULL
            );

            -- Embeddings are stored as f32 little-endian blobs.
            CREATE TABLE IF NOT EXISTS chunks (
                doc_id TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (doc_id, ordinal),
                FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| {
            StudyPalError::IndexUnavailable(format!("cannot initialize index schema: {e}"))
        })?;

        let stored_dims: Option<u32> = conn
            .query_row("SELECT value FROM meta WHERE key = 'dimensions'", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| StudyPalError::IndexUnavailable(format!("cannot read index meta: {e}")))?
            .and_then(|s| s.parse().ok());

        if let Some(stored) = stored_dims {
            if stored != dimensions {
                return Err(StudyPalError::Config(format!(
                    "index at {} was built with {stored}-dimensional vectors, \
                     but the configured embedding model produces {dimensions}",
                    db_path.display()
                )));
            }
        }

        Ok(Self {
            conn,
            dimensions,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Write one document's chunk batch, replacing any prior entries for
    /// the same document. The delete and all inserts share one transaction,
    /// so readers never observe a partially-written batch and a failure
    /// leaves the index exactly as it was.
    pub fn upsert(&mut self, document: &DocumentRecord, entries: &[IndexEntry]) -> StudyPalResult<()> {
        for entry in entries {
            if entry.embedding.len() as u32 != self.dimensions {
                return Err(StudyPalError::Config(format!(
                    "chunk {} of document {} has a {}-dimensional embedding, expected {}",
                    entry.ordinal,
                    document.doc_id,
                    entry.embedding.len(),
                    self.dimensions
                )));
            }
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('dimensions', ?1)",
            params![self.dimensions.to_string()],
        )?;

        tx.execute(
            "DELETE FROM chunks WHERE doc_id = ?1",
            params![document.doc_id],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO documents (doc_id, goal, backstory, page_count, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.doc_id,
                document.goal,
                document.backstory,
                document.page_count as i64,
                document.ingested_at,
            ],
        )?;

        for entry in entries {
            tx.execute(
                "INSERT INTO chunks (doc_id, ordinal, content, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![
                    document.doc_id,
                    entry.ordinal,
                    entry.content,
                    encode_embedding(&entry.embedding),
                ],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            doc_id = %document.doc_id,
            chunks = entries.len(),
            "document upserted into vector index"
        );
        Ok(())
    }

    /// Cosine-similarity search over every stored vector.
    ///
    /// Returns at most `top_k` hits with score >= `min_score`, ranked by
    /// descending similarity. Ties keep insertion order (earlier-inserted
    /// rows win placement). An empty index yields an empty result.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> StudyPalResult<Vec<RetrievalHit>> {
        if vector.len() as u32 != self.dimensions {
            return Err(StudyPalError::Config(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        let mut stmt = self.conn.prepare(
            "SELECT doc_id, ordinal, content, embedding FROM chunks ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut scored: Vec<RetrievalHit> = rows
            .into_iter()
            .map(|(doc_id, ordinal, content, blob)| {
                let embedding = decode_embedding(&blob);
                RetrievalHit {
                    doc_id,
                    ordinal,
                    content,
                    score: cosine_similarity(vector, &embedding),
                }
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        // Stable sort keeps rowid (insertion) order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Delete a document and all its chunks.
    pub fn remove_document(&mut self, doc_id: &str) -> StudyPalResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?;
        tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Ingestion metadata for one document, if present.
    pub fn document(&self, doc_id: &str) -> StudyPalResult<Option<DocumentRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT doc_id, goal, backstory, page_count, ingested_at
                 FROM documents WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok(DocumentRecord {
                        doc_id: row.get(0)?,
                        goal: row.get(1)?,
                        backstory: row.get(2)?,
                        page_count: row.get::<_, i64>(3)? as usize,
                        ingested_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn stats(&self) -> StudyPalResult<IndexStats> {
        let document_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let chunk_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        Ok(IndexStats {
            document_count: document_count as u64,
            chunk_count: chunk_count as u64,
            dimensions: self.dimensions,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Vector size this index was opened with.
    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_index(dir: &TempDir, dims: u32) -> VectorIndex {
        VectorIndex::open(&dir.path().join("index.db"), dims).unwrap()
    }

    fn record(doc_id: &str) -> DocumentRecord {
        DocumentRecord {
            doc_id: doc_id.into(),
            goal: "learn".into(),
            backstory: "test".into(),
            page_count: 1,
            ingested_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn entry(ordinal: u32, content: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            ordinal,
            content: content.into(),
            embedding,
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn embedding_blob_round_trip() {
        let values = vec![1.0f32, -2.5, 0.0009765625];
        assert_eq!(decode_embedding(&encode_embedding(&values)), values);
    }

    #[test]
    fn upsert_then_query_returns_exact_match_on_top() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);

        index
            .upsert(
                &record("doc"),
                &[
                    entry(0, "alpha", vec![1.0, 0.0, 0.0]),
                    entry(1, "beta", vec![0.0, 1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "alpha");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_index_query_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3);
        let hits = index.query(&[1.0, 0.0, 0.0], 5, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn reingesting_replaces_instead_of_appending() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);

        let entries = vec![
            entry(0, "alpha", vec![1.0, 0.0, 0.0]),
            entry(1, "beta", vec![0.0, 1.0, 0.0]),
        ];
        index.upsert(&record("doc"), &entries).unwrap();
        index.upsert(&record("doc"), &entries).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, 2);
    }

    #[test]
    fn min_score_filters_out_weak_matches() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);
        index
            .upsert(
                &record("doc"),
                &[
                    entry(0, "aligned", vec![1.0, 0.0, 0.0]),
                    entry(1, "orthogonal", vec![0.0, 1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 10, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "aligned");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);
        index
            .upsert(
                &record("doc"),
                &[
                    entry(0, "first", vec![1.0, 0.0, 0.0]),
                    entry(1, "second", vec![1.0, 0.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 2, 0.0).unwrap();
        assert_eq!(hits[0].content, "first");
        assert_eq!(hits[1].content, "second");
    }

    #[test]
    fn dimension_mismatch_on_upsert_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);
        let err = index
            .upsert(&record("doc"), &[entry(0, "bad", vec![1.0, 0.0])])
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn reopening_with_different_dimensions_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let mut index = VectorIndex::open(&path, 3).unwrap();
            index
                .upsert(&record("doc"), &[entry(0, "alpha", vec![1.0, 0.0, 0.0])])
                .unwrap();
        }
        let err = VectorIndex::open(&path, 4).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let mut index = VectorIndex::open(&path, 3).unwrap();
            index
                .upsert(&record("doc"), &[entry(0, "alpha", vec![1.0, 0.0, 0.0])])
                .unwrap();
        }

        let index = VectorIndex::open(&path, 3).unwrap();
        let hits = index.query(&[1.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "alpha");

        let doc = index.document("doc").unwrap().unwrap();
        assert_eq!(doc.goal, "learn");
    }

    #[test]
    fn remove_document_clears_its_chunks() {
        let dir = TempDir::new().unwrap();
        let mut index = open_index(&dir, 3);
        index
            .upsert(&record("doc"), &[entry(0, "alpha", vec![1.0, 0.0, 0.0])])
            .unwrap();
        index.remove_document("doc").unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.chunk_count, 0);
    }
}
