use thiserror::Error;

/// A result type for likelihood computations
pub type Result<T> = std::result::Result<T, LikelihoodError>;

/// An error when computing the marginal likelihood of a gaussian process
#[derive(Error, Debug)]
pub enum LikelihoodError {
    /// When the covariance matrix cannot be factorized
    #[error("covariance matrix is not positive definite (kernel {kernel}, hyperparams {hyperparams:?})")]
    NonPositiveDefinite {
        /// Type tag of the kernel whose covariance matrix failed to factorize
        kernel: String,
        /// Hyperparameter values at the failure point
        hyperparams: Vec<f64>,
    },
    /// When input sizes are inconsistent
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When a linear algebra computation fails outside the factorization itself
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
}
