//! Embedding matrix over the course catalog and cosine similarity ranking.
//!
//! Row `i` of the matrix always belongs to record `i` of the corpus it was
//! built from. [`SearchIndex`] owns both halves and exposes no way to change
//! either, so the alignment cannot be broken after `build`.

use std::cmp::Ordering;

use crate::corpus::{CorpusSnapshot, CourseRecord};
use crate::semantic::embeddings::{EmbeddingError, TextEncoder};

/// Vectors for every record of a corpus, in corpus order.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingMatrix {
    /// Built from an empty corpus; the encoder was never called.
    Empty,
    Dense {
        /// Encoder model the rows came from
        model_id: [u8; 32],
        dimensions: usize,
        rows: Vec<Vec<f32>>,
    },
}

impl EmbeddingMatrix {
    pub fn len(&self) -> usize {
        match self {
            EmbeddingMatrix::Empty => 0,
            EmbeddingMatrix::Dense { rows, .. } => rows.len(),
        }
    }

    #[cfg(test)]
    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        match self {
            EmbeddingMatrix::Empty => None,
            EmbeddingMatrix::Dense { rows, .. } => rows.get(idx).map(Vec::as_slice),
        }
    }

    /// Encodes `title + " " + content` of every record, in order.
    ///
    /// One encoder call per record. An empty corpus yields
    /// [`EmbeddingMatrix::Empty`] without calling the encoder at all.
    pub fn build(corpus: &CorpusSnapshot, encoder: &dyn TextEncoder) -> Result<Self, IndexError> {
        if corpus.is_empty() {
            return Ok(EmbeddingMatrix::Empty);
        }

        let dimensions = encoder.dimensions();
        let mut rows = Vec::with_capacity(corpus.len());

        for record in corpus.iter() {
            let embedding = encoder.embed(&record.embedding_text())?;
            if embedding.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: embedding.len(),
                });
            }
            rows.push(embedding);
        }

        Ok(EmbeddingMatrix::Dense {
            model_id: encoder.model_id(),
            dimensions,
            rows,
        })
    }
}

/// A scored match, borrowed from the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCourse<'a> {
    pub record: &'a CourseRecord,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot search with zero-norm vector")]
    ZeroNormVector,

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Keyword is required")]
    EmptyQuery,

    #[error("corpus has {corpus} records but the index has {matrix} rows")]
    Misaligned { corpus: usize, matrix: usize },

    #[error("index was built with a different embedding model")]
    ModelMismatch,

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<EmbeddingError> for SearchError {
    fn from(err: EmbeddingError) -> Self {
        SearchError::Index(IndexError::Embedding(err))
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between `query` and `target`, `query_norm` precomputed.
/// A zero-norm target scores 0.0.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

/// Similarity descending, then corpus position ascending.
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Ranks `corpus` against `query` and returns at most `top_n` matches, best
/// first.
///
/// The query is encoded with `encoder`, which must be the model `matrix` was
/// built with. Equal scores keep corpus order. Nothing is mutated.
pub fn search<'a>(
    encoder: &dyn TextEncoder,
    query: &str,
    corpus: &'a CorpusSnapshot,
    matrix: &EmbeddingMatrix,
    top_n: usize,
) -> Result<Vec<ScoredCourse<'a>>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    if corpus.len() != matrix.len() {
        return Err(SearchError::Misaligned {
            corpus: corpus.len(),
            matrix: matrix.len(),
        });
    }

    let (model_id, dimensions, rows) = match matrix {
        EmbeddingMatrix::Empty => return Ok(vec![]),
        EmbeddingMatrix::Dense {
            model_id,
            dimensions,
            rows,
        } => (model_id, *dimensions, rows),
    };

    if encoder.model_id() != *model_id {
        return Err(SearchError::ModelMismatch);
    }

    let query_embedding = encoder.embed(query)?;
    if query_embedding.len() != dimensions {
        return Err(IndexError::DimensionMismatch {
            expected: dimensions,
            got: query_embedding.len(),
        }
        .into());
    }

    let query_norm = l2_norm(&query_embedding);
    if query_norm < f32::EPSILON {
        return Err(IndexError::ZeroNormVector.into());
    }

    let mut scored: Vec<(usize, f32)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx, cosine_similarity(&query_embedding, row, query_norm)))
        .collect();

    scored.sort_by(rank);
    scored.truncate(top_n);

    Ok(scored
        .into_iter()
        .filter_map(|(idx, score)| {
            corpus.get(idx).map(|record| ScoredCourse { record, score })
        })
        .collect())
}

/// A corpus together with the matrix built from it.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    corpus: CorpusSnapshot,
    matrix: EmbeddingMatrix,
}

impl SearchIndex {
    pub fn build(corpus: CorpusSnapshot, encoder: &dyn TextEncoder) -> Result<Self, IndexError> {
        let matrix = EmbeddingMatrix::build(&corpus, encoder)?;
        Ok(Self { corpus, matrix })
    }

    #[cfg(test)]
    pub fn corpus(&self) -> &CorpusSnapshot {
        &self.corpus
    }

    #[cfg(test)]
    pub fn matrix(&self) -> &EmbeddingMatrix {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn search(
        &self,
        encoder: &dyn TextEncoder,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<ScoredCourse<'_>>, SearchError> {
        search(encoder, query, &self.corpus, &self.matrix, top_n)
    }
}
