mod common;

use common::assertions::{assert_recall_at_k, assert_top_result};
use common::harness::TestHarness;
use common::vectors::{clustered_vectors, random_vectors};

use cortexdb::index::distance::euclidean_distance;
use cortexdb::types::DistanceMetric;

#[test]
fn test_compact_purges_tombstones() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("purge", 8, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db.insert("purge", random_vectors(100, 8), vec![]).unwrap();
    let doomed: Vec<u64> = ids.iter().copied().take(40).collect();
    db.delete("purge", &doomed).unwrap();

    let info = db.collection_info("purge").unwrap();
    assert_eq!(info.live_count, 60);
    assert_eq!(info.deleted_count, 40);

    let purged = db.compact("purge").unwrap();
    assert_eq!(purged, 40);

    let info = db.collection_info("purge").unwrap();
    assert_eq!(info.live_count, 60);
    assert_eq!(info.deleted_count, 0);
}

#[test]
fn test_compact_preserves_ids_and_metadata() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("keep", 4, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert(
            "keep",
            vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
            vec![
                Some(b"one".to_vec()),
                Some(b"two".to_vec()),
                Some(b"three".to_vec()),
            ],
        )
        .unwrap();
    db.delete("keep", &[ids[1]]).unwrap();
    db.compact("keep").unwrap();

    let record = db.get("keep", ids[2]).unwrap();
    assert_eq!(record.id, ids[2]);
    assert_eq!(record.metadata, Some(b"three".to_vec()));
    assert!(db.get("keep", ids[1]).is_err());
}

#[test]
fn test_compact_does_not_reissue_ids() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("noreuse", 1, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db
        .insert("noreuse", vec![vec![1.0], vec![2.0], vec![3.0]], vec![])
        .unwrap();
    // Delete the record holding the highest id, then compact it away.
    db.delete("noreuse", &[ids[2]]).unwrap();
    db.compact("noreuse").unwrap();

    let next = db.insert("noreuse", vec![vec![4.0]], vec![]).unwrap();
    assert_eq!(next, vec![3], "compaction must not roll back the id counter");
}

#[test]
fn test_compact_preserves_recall() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("recall", 16, DistanceMetric::Euclidean)
        .unwrap();
    let (vectors, centroids) = clustered_vectors(4, 60, 16, 0.05);
    let ids = db.insert("recall", vectors.clone(), vec![]).unwrap();

    let doomed: Vec<u64> = ids.iter().copied().step_by(4).collect();
    db.delete("recall", &doomed).unwrap();
    db.compact("recall").unwrap();

    let dead: std::collections::HashSet<u64> = doomed.into_iter().collect();
    let query = &centroids[1];

    let mut truth: Vec<(u64, f32)> = vectors
        .iter()
        .zip(&ids)
        .filter(|(_, id)| !dead.contains(id))
        .map(|(v, &id)| (id, euclidean_distance(query, v)))
        .collect();
    truth.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let ground_truth: Vec<u64> = truth.iter().take(10).map(|&(id, _)| id).collect();

    let results = db.search("recall", query, 10, Some(240)).unwrap();
    assert_recall_at_k(&results, &ground_truth, 10, 0.9);
}

#[test]
fn test_compact_empty_and_all_deleted() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("empty", 2, DistanceMetric::Euclidean)
        .unwrap();
    assert_eq!(db.compact("empty").unwrap(), 0);

    let ids = db
        .insert("empty", vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![])
        .unwrap();
    db.delete("empty", &ids).unwrap();
    assert_eq!(db.compact("empty").unwrap(), 2);

    let info = db.collection_info("empty").unwrap();
    assert_eq!(info.live_count, 0);
    assert_eq!(info.deleted_count, 0);
    assert!(db.search("empty", &[1.0, 0.0], 1, None).unwrap().is_empty());
}

#[test]
fn test_compacted_state_survives_snapshot_and_reopen() {
    let mut harness = TestHarness::new();
    {
        let db = harness.db();
        db.create_collection("sc", 4, DistanceMetric::Euclidean)
            .unwrap();
        let ids = db.insert("sc", random_vectors(40, 4), vec![]).unwrap();
        db.delete("sc", &ids[..10]).unwrap();
        db.compact("sc").unwrap();
        db.snapshot().unwrap();
    }

    harness.reopen();
    let db = harness.db();
    let info = db.collection_info("sc").unwrap();
    assert_eq!(info.live_count, 30);
    assert_eq!(info.deleted_count, 0);

    let results = db.search("sc", &[0.0, 0.0, 0.0, 0.0], 5, None).unwrap();
    assert_eq!(results.len(), 5);
}

#[test]
fn test_searches_match_before_and_after_compaction() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("same", 8, DistanceMetric::Euclidean)
        .unwrap();
    let ids = db.insert("same", random_vectors(80, 8), vec![]).unwrap();
    db.delete("same", &ids[..20]).unwrap();

    let query = vec![0.1; 8];
    let before = db.search("same", &query, 10, Some(160)).unwrap();
    db.compact("same").unwrap();
    let after = db.search("same", &query, 10, Some(160)).unwrap();

    let before_ids: Vec<u64> = before.iter().map(|r| r.id).collect();
    let after_ids: Vec<u64> = after.iter().map(|r| r.id).collect();
    assert_eq!(before_ids, after_ids);
}

#[test]
fn test_self_recall_after_compaction() {
    let harness = TestHarness::new();
    let db = harness.db();

    db.create_collection("self", 8, DistanceMetric::Cosine)
        .unwrap();
    let vectors = random_vectors(60, 8);
    let ids = db.insert("self", vectors.clone(), vec![]).unwrap();
    db.delete("self", &ids[..15]).unwrap();
    db.compact("self").unwrap();

    let results = db.search("self", &vectors[30], 1, Some(120)).unwrap();
    assert_top_result(&results, ids[30]);
}
