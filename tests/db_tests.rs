mod common;

use common::assertions::{assert_ranked_ascending, assert_top_result};
use common::harness::TestHarness;

use cortexdb::error::CortexError;
use cortexdb::types::DistanceMetric;

// ─── Collection lifecycle ───

#[test]
fn test_create_list_info() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("docs", 3, DistanceMetric::Euclidean)
        .unwrap();
    db.create_collection("images", 8, DistanceMetric::Cosine)
        .unwrap();

    let mut names = db.list_collections();
    names.sort();
    assert_eq!(names, vec!["docs", "images"]);

    let info = db.collection_info("docs").unwrap();
    assert_eq!(info.dimension, 3);
    assert_eq!(info.metric, DistanceMetric::Euclidean);
    assert_eq!(info.live_count, 0);
}

#[test]
fn test_create_duplicate_fails() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("dup", 4, DistanceMetric::Cosine)
        .unwrap();
    let err = db
        .create_collection("dup", 4, DistanceMetric::Cosine)
        .unwrap_err();
    assert!(matches!(err, CortexError::CollectionAlreadyExists { .. }));
}

#[test]
fn test_create_zero_dimension_fails() {
    let harness = TestHarness::new();
    let err = harness
        .db()
        .create_collection("bad", 0, DistanceMetric::Euclidean)
        .unwrap_err();
    assert!(matches!(err, CortexError::InvalidArgument(_)));
}

#[test]
fn test_create_invalid_name_fails() {
    let harness = TestHarness::new();
    for name in ["", "has space", "slash/name", "käse"] {
        let err = harness
            .db()
            .create_collection(name, 4, DistanceMetric::Euclidean)
            .unwrap_err();
        assert!(
            matches!(err, CortexError::InvalidArgument(_)),
            "name {name:?} should be rejected"
        );
    }
}

#[test]
fn test_delete_collection() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("gone", 4, DistanceMetric::Euclidean)
        .unwrap();
    db.delete_collection("gone").unwrap();

    assert!(db.list_collections().is_empty());
    assert!(matches!(
        db.collection_info("gone"),
        Err(CortexError::CollectionNotFound { .. })
    ));
    assert!(matches!(
        db.delete_collection("gone"),
        Err(CortexError::CollectionNotFound { .. })
    ));
}

#[test]
fn test_collection_names_are_reusable_after_delete() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("again", 2, DistanceMetric::Euclidean)
        .unwrap();
    db.insert("again", vec![vec![1.0, 0.0]], vec![]).unwrap();
    db.delete_collection("again").unwrap();

    db.create_collection("again", 5, DistanceMetric::Cosine)
        .unwrap();
    let info = db.collection_info("again").unwrap();
    assert_eq!(info.dimension, 5);
    assert_eq!(info.live_count, 0);
}

// ─── Insert ───

#[test]
fn test_insert_assigns_sequential_ids() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("seq", 2, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert(
            "seq",
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![],
        )
        .unwrap();
    assert_eq!(ids, vec![0, 1, 2]);

    let more = db.insert("seq", vec![vec![2.0, 2.0]], vec![]).unwrap();
    assert_eq!(more, vec![3]);
    assert_eq!(db.collection_info("seq").unwrap().live_count, 4);
}

#[test]
fn test_insert_dimension_mismatch_leaves_state_unchanged() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("dim", 3, DistanceMetric::Euclidean)
        .unwrap();
    let err = db
        .insert("dim", vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]], vec![])
        .unwrap_err();
    match err {
        CortexError::DimensionMismatch { expected, actual } => {
            assert_eq!((expected, actual), (3, 2));
        }
        other => panic!("expected DimensionMismatch, got: {other}"),
    }

    // The whole batch was rejected, including the valid first vector.
    assert_eq!(db.collection_info("dim").unwrap().live_count, 0);
    let ids = db.insert("dim", vec![vec![1.0, 0.0, 0.0]], vec![]).unwrap();
    assert_eq!(ids, vec![0]);
}

#[test]
fn test_insert_metadata_roundtrip() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("meta", 2, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert(
            "meta",
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![Some(b"alpha".to_vec()), None],
        )
        .unwrap();

    let record = db.get("meta", ids[0]).unwrap();
    assert_eq!(record.vector, vec![1.0, 0.0]);
    assert_eq!(record.metadata, Some(b"alpha".to_vec()));
    assert_eq!(db.get("meta", ids[1]).unwrap().metadata, None);
}

#[test]
fn test_insert_metadata_length_mismatch_fails() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("meta2", 2, DistanceMetric::Euclidean)
        .unwrap();
    let err = db
        .insert(
            "meta2",
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![Some(b"only one".to_vec())],
        )
        .unwrap_err();
    assert!(matches!(err, CortexError::InvalidArgument(_)));
}

#[test]
fn test_insert_oversized_batch_fails() {
    let harness = TestHarness::with_config_fn(|config| {
        config.limits.max_batch_size = 4;
    });
    let db = harness.db();

    db.create_collection("cap", 1, DistanceMetric::Euclidean)
        .unwrap();
    let batch: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32]).collect();
    let err = db.insert("cap", batch, vec![]).unwrap_err();
    assert!(matches!(err, CortexError::InvalidArgument(_)));
    assert_eq!(db.collection_info("cap").unwrap().live_count, 0);
}

#[test]
fn test_insert_into_missing_collection_fails() {
    let harness = TestHarness::new();
    let err = harness
        .db()
        .insert("nope", vec![vec![1.0]], vec![])
        .unwrap_err();
    assert!(matches!(err, CortexError::CollectionNotFound { .. }));
}

// ─── Delete ───

#[test]
fn test_delete_then_get_fails() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("del", 2, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert("del", vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![])
        .unwrap();

    db.delete("del", &[ids[0]]).unwrap();
    assert!(matches!(
        db.get("del", ids[0]),
        Err(CortexError::VectorNotFound { .. })
    ));
    assert!(db.get("del", ids[1]).is_ok());

    let info = db.collection_info("del").unwrap();
    assert_eq!(info.live_count, 1);
    assert_eq!(info.deleted_count, 1);
}

#[test]
fn test_double_delete_fails_and_changes_nothing() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("dd", 2, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert("dd", vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![])
        .unwrap();
    db.delete("dd", &[ids[0]]).unwrap();

    // Batch containing an already-deleted id fails atomically.
    let err = db.delete("dd", &[ids[1], ids[0]]).unwrap_err();
    assert!(matches!(err, CortexError::VectorNotFound { .. }));
    assert_eq!(db.collection_info("dd").unwrap().live_count, 1);
}

#[test]
fn test_delete_duplicate_ids_in_batch_fails() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("dup-ids", 1, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db.insert("dup-ids", vec![vec![1.0]], vec![]).unwrap();
    let err = db.delete("dup-ids", &[ids[0], ids[0]]).unwrap_err();
    assert!(matches!(err, CortexError::InvalidArgument(_)));
    assert_eq!(db.collection_info("dup-ids").unwrap().live_count, 1);
}

// ─── Search ───

#[test]
fn test_example_scenario() {
    // Three axis-aligned unit vectors, query near the first axis.
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("docs", 3, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert(
            "docs",
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            vec![],
        )
        .unwrap();
    assert_eq!(ids, vec![0, 1, 2]);

    let results = db.search("docs", &[0.9, 0.1, 0.0], 1, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_top_result(&results, 0);
}

#[test]
fn test_search_k_zero_fails() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("k0", 2, DistanceMetric::Euclidean)
        .unwrap();
    let err = db.search("k0", &[1.0, 0.0], 0, None).unwrap_err();
    assert!(matches!(err, CortexError::InvalidArgument(_)));
}

#[test]
fn test_search_k_clamps_to_live_count() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("clamp", 2, DistanceMetric::Euclidean)
        .unwrap();
    db.insert("clamp", vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![])
        .unwrap();

    let results = db.search("clamp", &[1.0, 0.0], 100, None).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_search_empty_collection_returns_nothing() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("empty", 2, DistanceMetric::Euclidean)
        .unwrap();
    let results = db.search("empty", &[1.0, 0.0], 5, None).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_search_dimension_mismatch() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("sdim", 4, DistanceMetric::Euclidean)
        .unwrap();
    let err = db.search("sdim", &[1.0, 0.0], 1, None).unwrap_err();
    assert!(matches!(err, CortexError::DimensionMismatch { .. }));
}

#[test]
fn test_search_returns_metadata_in_rank_order() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("ranked", 2, DistanceMetric::Euclidean)
        .unwrap();
    db.insert(
        "ranked",
        vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]],
        vec![
            Some(b"origin".to_vec()),
            Some(b"near".to_vec()),
            Some(b"far".to_vec()),
        ],
    )
    .unwrap();

    let results = db.search("ranked", &[0.1, 0.0], 3, None).unwrap();
    assert_eq!(results.len(), 3);
    assert_ranked_ascending(&results);
    assert_eq!(results[0].metadata, Some(b"origin".to_vec()));
    assert_eq!(results[2].metadata, Some(b"far".to_vec()));
}

// ─── Concurrency ───

#[test]
fn test_concurrent_inserts_yield_distinct_ids() {
    let harness = TestHarness::new();
    harness
        .db()
        .create_collection("conc", 4, DistanceMetric::Euclidean)
        .unwrap();

    let db = harness.db();
    let threads = 8;
    let per_thread = 25;

    let mut all_ids: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                scope.spawn(move || {
                    let mut ids = Vec::new();
                    for i in 0..per_thread {
                        let v = vec![t as f32, i as f32, 0.0, 1.0];
                        ids.extend(db.insert("conc", vec![v], vec![]).unwrap());
                    }
                    ids
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    all_ids.sort_unstable();
    let expected: Vec<u64> = (0..(threads * per_thread) as u64).collect();
    assert_eq!(all_ids, expected, "ids must be distinct and gap-free");
}

#[test]
fn test_concurrent_searches_during_inserts() {
    let harness = TestHarness::new();
    let db = harness.db();
    db.create_collection("rw", 4, DistanceMetric::Euclidean)
        .unwrap();
    db.insert("rw", vec![vec![0.0, 0.0, 0.0, 0.0]], vec![])
        .unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..50 {
                let v = vec![i as f32, 1.0, 0.0, 0.0];
                db.insert("rw", vec![v], vec![]).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                let results = db.search("rw", &[0.0, 0.0, 0.0, 0.0], 1, None).unwrap();
                assert!(!results.is_empty());
            }
        });
    });

    assert_eq!(db.collection_info("rw").unwrap().live_count, 51);
}
