use std::sync::Arc;

use super::*;
use crate::app::{AppContext, AppError};
use crate::config::Config;
use crate::corpus::CorpusSnapshot;
use crate::semantic::{search, EmbeddingMatrix, SearchError, SearchIndex};

fn catalog(n: usize) -> CorpusSnapshot {
    let topics = [
        ("Python for Data Science", "pandas numpy python data analysis"),
        ("Machine Learning Basics", "regression classification models training"),
        ("Deep Learning with PyTorch", "neural networks tensors gradients"),
        ("SQL for Analysts", "select joins aggregation database queries"),
        ("Excel Essentials", "spreadsheets pivot tables formulas"),
        ("Natural Language Processing", "text tokens embeddings transformers"),
        ("Computer Vision", "images convolution detection"),
        ("Statistics Refresher", "probability distributions hypothesis tests"),
    ];

    topics
        .iter()
        .cycle()
        .take(n)
        .enumerate()
        .map(|(i, (title, content))| record(&format!("{title} {i}"), content))
        .collect()
}

#[test]
fn test_result_length_is_min_of_five_and_corpus() {
    let encoder = HashEncoder::new();

    for n in 0..=12 {
        let corpus = catalog(n);
        let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

        let results = search(&encoder, "python data", &corpus, &matrix, 5).unwrap();
        assert_eq!(results.len(), n.min(5), "corpus of {n}");
    }
}

#[test]
fn test_results_sorted_descending() {
    let encoder = HashEncoder::new();
    let corpus = catalog(8);
    let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

    for query in ["python data", "neural networks", "pivot tables excel", "unrelated words"] {
        let results = search(&encoder, query, &corpus, &matrix, 5).unwrap();
        assert!(
            results.windows(2).all(|w| w[0].score >= w[1].score),
            "unsorted results for {query:?}"
        );
        assert!(results.iter().all(|r| (-1.0..=1.0001).contains(&r.score)));
    }
}

#[test]
fn test_relevant_course_ranks_first() {
    let encoder = HashEncoder::new();
    let corpus = catalog(8);
    let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

    let results = search(&encoder, "joins aggregation database", &corpus, &matrix, 5).unwrap();
    assert!(results[0].record.title.starts_with("SQL for Analysts"));
}

#[test]
fn test_empty_corpus_returns_nothing() {
    let encoder = HashEncoder::new();
    let corpus = CorpusSnapshot::empty();
    let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

    assert_eq!(matrix, EmbeddingMatrix::Empty);
    assert!(search(&encoder, "python", &corpus, &matrix, 5).unwrap().is_empty());
    assert_eq!(encoder.calls(), 0);
}

#[test]
fn test_empty_query_rejected_for_any_corpus() {
    let encoder = HashEncoder::new();

    for n in [0, 1, 8] {
        let corpus = catalog(n);
        let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();
        assert!(matches!(
            search(&encoder, "", &corpus, &matrix, 5),
            Err(SearchError::EmptyQuery)
        ));
    }
}

#[test]
fn test_identical_text_identical_rows() {
    let encoder = HashEncoder::new();
    let corpus = CorpusSnapshot::new(vec![
        record("Same Course", "same words here"),
        record("Other", "something else"),
        CourseRecord::new("Same Course", "https://mirror.example.com/same", "same words here"),
    ]);

    let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

    let bits = |row: &[f32]| row.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(matrix.row(0).unwrap()), bits(matrix.row(2).unwrap()));
}

#[test]
fn test_duplicate_records_tie_in_corpus_order() {
    let encoder = HashEncoder::new();
    let corpus = CorpusSnapshot::new(vec![
        record("Filler", "nothing relevant"),
        CourseRecord::new("Twin", "https://x.example.com/second", "identical text"),
        CourseRecord::new("Twin", "https://x.example.com/first", "identical text"),
    ]);
    let matrix = EmbeddingMatrix::build(&corpus, &encoder).unwrap();

    let results = search(&encoder, "twin identical text", &corpus, &matrix, 5).unwrap();

    assert_eq!(results[0].score, results[1].score);
    assert_eq!(results[0].record.link, "https://x.example.com/second");
    assert_eq!(results[1].record.link, "https://x.example.com/first");
}

#[test]
fn test_index_from_other_model_rejected() {
    let index = SearchIndex::build(catalog(3), &HashEncoder::named("model-a")).unwrap();

    let result = index.search(&HashEncoder::named("model-b"), "python", 5);
    assert!(matches!(result, Err(SearchError::ModelMismatch)));
}

fn context_with(store: crate::corpus::CorpusStore, encoder: Arc<HashEncoder>) -> AppContext {
    let config = Config::default();
    AppContext::new(
        config,
        store,
        encoder,
        Arc::new(FakeFetcher::new()),
        Arc::new(RecordingPacer::default()),
    )
    .unwrap()
}

#[test]
fn test_context_missing_catalog_serves_empty_index() {
    let (store, _tmp) = create_store();
    let encoder = Arc::new(HashEncoder::new());

    let ctx = context_with(store, encoder.clone());

    assert!(ctx.index().is_empty());
    assert!(ctx.search("python").unwrap().is_empty());
    // only the query would be encoded, and the empty index short-circuits first
    assert_eq!(encoder.calls(), 0);
}

#[test]
fn test_context_corrupt_catalog_serves_empty_index() {
    let (store, tmp) = create_store();
    std::fs::write(tmp.path().join("courses_data.json"), b"[{\"title\": 1}]").unwrap();

    let ctx = context_with(store, Arc::new(HashEncoder::new()));

    assert!(ctx.index().is_empty());
    assert!(ctx.courses().is_empty());
}

#[test]
fn test_context_embeds_catalog_once() {
    let (store, _tmp) = create_store();
    store.save(&catalog(6)).unwrap();
    let encoder = Arc::new(HashEncoder::new());

    let ctx = context_with(store, encoder.clone());
    assert_eq!(encoder.calls(), 6);

    ctx.search("python").unwrap();
    ctx.search("sql").unwrap();

    // one call per query, the catalog is not re-embedded
    assert_eq!(encoder.calls(), 8);
}

#[test]
fn test_context_search_hits() {
    let (store, _tmp) = create_store();
    store.save(&catalog(8)).unwrap();
    let ctx = context_with(store, Arc::new(HashEncoder::new()));

    let hits = ctx.search("neural networks tensors").unwrap();

    assert_eq!(hits.len(), 5);
    assert!(hits[0].title.starts_with("Deep Learning with PyTorch"));
    assert_eq!(hits[0].content, "neural networks tensors gradients");
    assert!(matches!(
        ctx.search(""),
        Err(AppError::Search(SearchError::EmptyQuery))
    ));
}
