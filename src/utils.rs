use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Computes pairwise squared euclidean distances between the rows of `x`,
/// resulting in a symmetric (n, n) array with a zero diagonal.
pub fn pairwise_sq_dists<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
    let n = x.nrows();
    let mut d2 = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &x.row(i) - &x.row(j);
            let sq = diff.mapv(|v| v * v).sum();
            d2[[i, j]] = sq;
            d2[[j, i]] = sq;
        }
    }
    d2
}
