use cortexdb::types::SearchResult;

/// Assert that the top result has the expected id.
pub fn assert_top_result(results: &[SearchResult], expected_id: u64) {
    assert!(
        !results.is_empty(),
        "search results are empty, expected top result {expected_id}"
    );
    assert_eq!(
        results[0].id, expected_id,
        "top result is {}, expected {expected_id}",
        results[0].id
    );
}

/// Assert that scores never decrease across returned ranks.
pub fn assert_ranked_ascending(results: &[SearchResult]) {
    for window in results.windows(2) {
        assert!(
            window[0].score <= window[1].score,
            "ranking not ascending: {} ({}) before {} ({})",
            window[0].id,
            window[0].score,
            window[1].id,
            window[1].score
        );
    }
}

/// Compute recall@k: what fraction of the true top-k are in the returned results.
pub fn recall_at_k(results: &[SearchResult], ground_truth: &[u64], k: usize) -> f64 {
    let k = k.min(ground_truth.len()).min(results.len());
    if k == 0 {
        return 1.0;
    }

    let truth: std::collections::HashSet<u64> = ground_truth.iter().take(k).copied().collect();
    let returned: std::collections::HashSet<u64> =
        results.iter().take(k).map(|r| r.id).collect();

    truth.intersection(&returned).count() as f64 / k as f64
}

/// Assert that recall@k meets a minimum threshold.
pub fn assert_recall_at_k(
    results: &[SearchResult],
    ground_truth: &[u64],
    k: usize,
    min_recall: f64,
) {
    let recall = recall_at_k(results, ground_truth, k);
    assert!(
        recall >= min_recall,
        "recall@{k} = {recall:.3}, expected >= {min_recall:.3}. \
         Results: {:?}, Truth: {:?}",
        results.iter().take(k).map(|r| r.id).collect::<Vec<_>>(),
        ground_truth.iter().take(k).collect::<Vec<_>>()
    );
}
