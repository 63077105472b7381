use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate `n` random vectors of dimension `dims` with uniform f32 values in [-1, 1].
pub fn random_vectors(n: usize, dims: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// Generate vectors clustered around `n_clusters` known centroids.
/// Returns (vectors, centroids); centroids are the ground truth for recall
/// testing.
///
/// Each centroid is a random unit vector. Vectors in each cluster are the
/// centroid plus small uniform noise (half-width = `noise`).
pub fn clustered_vectors(
    n_clusters: usize,
    n_per_cluster: usize,
    dims: usize,
    noise: f32,
) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let mut rng = StdRng::seed_from_u64(123);

    let centroids: Vec<Vec<f32>> = (0..n_clusters)
        .map(|_| {
            let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            v.iter().map(|x| x / norm).collect()
        })
        .collect();

    let mut vectors = Vec::with_capacity(n_clusters * n_per_cluster);
    for centroid in &centroids {
        for _ in 0..n_per_cluster {
            let values: Vec<f32> = centroid
                .iter()
                .map(|&c| c + rng.gen_range(-noise..noise))
                .collect();
            vectors.push(values);
        }
    }

    (vectors, centroids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_vectors() {
        let vecs = random_vectors(10, 128);
        assert_eq!(vecs.len(), 10);
        assert_eq!(vecs[0].len(), 128);
    }

    #[test]
    fn test_clustered_vectors() {
        let (vecs, centroids) = clustered_vectors(3, 5, 64, 0.05);
        assert_eq!(vecs.len(), 15);
        assert_eq!(centroids.len(), 3);
        assert_eq!(vecs[0].len(), 64);
    }
}
