//! Objective and gradient entry points for an external optimizer working in
//! log-hyperparameter space.
//!
//! Optimizers manipulate log hyperparameters to keep them positive and well
//! conditioned, while kernels consume linear-space values: every entry point
//! exponentiates before building the kernel. The kernel type parameter acts
//! as the factory producing a configured instance per evaluation.

use linfa::Float;
use ndarray::{Array1, Array2};

use crate::errors::{LikelihoodError, Result};
use crate::kernels::Kernel;
use crate::likelihood::{marginal_likelihood, LikelihoodConfig};

/// Penalty value returned by [`nlml`] in place of an infeasible evaluation
pub const BAD_PARAMS_PENALTY: f64 = 100.;

/// Negative log marginal likelihood at `loghyper`.
///
/// A [`LikelihoodError::NonPositiveDefinite`] failure from the engine is
/// recovered into the finite [`BAD_PARAMS_PENALTY`] sentinel instead of being
/// propagated, telling the optimizer this region of hyperparameter space is
/// infeasible without aborting the search. This soft failure is intentional
/// and unique to this entry point; the failure has already been recorded to
/// the bad-hyperparameter log by then. Dimension and arity errors still fail
/// fast.
pub fn nlml<F: Float, K: Kernel<F>>(
    loghyper: &Array1<F>,
    x: &Array2<F>,
    y: &Array1<F>,
    config: &LikelihoodConfig<F>,
) -> Result<F> {
    let kernel = K::from_params(&loghyper.mapv(|v| v.exp()))?;
    match marginal_likelihood(&kernel, x, y, false, &cholesky_config(config)) {
        Ok((value, _)) => Ok(value),
        Err(LikelihoodError::NonPositiveDefinite { .. }) => Ok(F::cast(BAD_PARAMS_PENALTY)),
        Err(err) => Err(err),
    }
}

/// Negative log marginal likelihood accumulated over multiple independent
/// `(x, y)` instances sharing one kernel.
///
/// Unlike [`nlml`] no failure is recovered: the first failing instance
/// propagates to the caller.
pub fn nlml_multi<F: Float, K: Kernel<F>>(
    loghyper: &Array1<F>,
    instances: &[(Array2<F>, Array1<F>)],
    config: &LikelihoodConfig<F>,
) -> Result<F> {
    let kernel = K::from_params(&loghyper.mapv(|v| v.exp()))?;
    let config = cholesky_config(config);
    let mut total = F::zero();
    for (x, y) in instances {
        let (value, _) = marginal_likelihood(&kernel, x, y, false, &config)?;
        total = total + value;
    }
    Ok(total)
}

/// Gradient of the negative log marginal likelihood with respect to each
/// log hyperparameter.
///
/// The engine differentiates with respect to linear-space hyperparameters;
/// the chain rule `d/d ln(h) = h * d/dh` converts to the log space the
/// optimizer works in. No failure is recovered.
pub fn dnlml<F: Float, K: Kernel<F>>(
    loghyper: &Array1<F>,
    x: &Array2<F>,
    y: &Array1<F>,
    config: &LikelihoodConfig<F>,
) -> Result<Array1<F>> {
    let kernel = K::from_params(&loghyper.mapv(|v| v.exp()))?;
    let (_, gradient) = marginal_likelihood(&kernel, x, y, true, &cholesky_config(config))?;
    Ok(gradient.expect("gradient computed") * kernel.params())
}

/// The optimizer entry points always evaluate through the Cholesky path;
/// the direct-inverse path stays reachable through [`marginal_likelihood`].
fn cholesky_config<F: Float>(config: &LikelihoodConfig<F>) -> LikelihoodConfig<F> {
    LikelihoodConfig {
        use_cholesky: true,
        ..config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::SquaredExponentialKernel;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::array;

    type SqExp = SquaredExponentialKernel<f64>;

    fn training_data() -> (Array2<f64>, Array1<f64>) {
        (array![[0.0], [1.0], [2.0]], array![0.0, 0.8, 0.1])
    }

    fn quiet_config() -> LikelihoodConfig<f64> {
        LikelihoodConfig {
            bad_params_log: None,
            ..LikelihoodConfig::default()
        }
    }

    #[test]
    fn test_nlml_finite() {
        let (x, y) = training_data();
        let loghyper = array![0.0, 0.0];
        let value = nlml::<f64, SqExp>(&loghyper, &x, &y, &quiet_config()).unwrap();
        assert!(value.is_finite());
    }

    #[test]
    fn test_dnlml_matches_finite_differences() {
        let (x, y) = training_data();
        let config = quiet_config();
        let loghyper = array![0.8f64.ln(), 1.2f64.ln()];
        let gradient = dnlml::<f64, SqExp>(&loghyper, &x, &y, &config).unwrap();
        assert_eq!(gradient.len(), 2);
        let fdiff = loghyper
            .central_diff(&|lh: &Array1<f64>| nlml::<f64, SqExp>(lh, &x, &y, &config).unwrap());
        assert_abs_diff_eq!(gradient, fdiff, epsilon = 1e-4);
    }

    #[test]
    fn test_permutation_invariance() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 0.8, 0.1];
        let x_perm = array![[2.0], [0.0], [1.0]];
        let y_perm = array![0.1, 0.0, 0.8];
        let loghyper = array![0.2, -0.1];
        let config = quiet_config();
        let value = nlml::<f64, SqExp>(&loghyper, &x, &y, &config).unwrap();
        let value_perm = nlml::<f64, SqExp>(&loghyper, &x_perm, &y_perm, &config).unwrap();
        assert_abs_diff_eq!(value, value_perm, epsilon = 1e-10);
    }

    #[test]
    fn test_nlml_returns_penalty_on_bad_params() {
        // duplicate inputs with zero noise: covariance matrix is singular
        let x = array![[0.0], [0.0], [1.0]];
        let y = array![0.5, 0.5, 1.0];
        let loghyper = array![0.0, 0.0];
        let config = LikelihoodConfig {
            noise: 0.0,
            ..quiet_config()
        };
        let value = nlml::<f64, SqExp>(&loghyper, &x, &y, &config).unwrap();
        assert_eq!(value, BAD_PARAMS_PENALTY);
    }

    #[test]
    fn test_dnlml_propagates_bad_params() {
        let x = array![[0.0], [0.0], [1.0]];
        let y = array![0.5, 0.5, 1.0];
        let loghyper = array![0.0, 0.0];
        let config = LikelihoodConfig {
            noise: 0.0,
            ..quiet_config()
        };
        let res = dnlml::<f64, SqExp>(&loghyper, &x, &y, &config);
        assert!(matches!(
            res,
            Err(LikelihoodError::NonPositiveDefinite { .. })
        ));
    }

    #[test]
    fn test_bad_arity_fails_fast() {
        let (x, y) = training_data();
        let loghyper = array![0.0, 0.0, 0.0];
        let res = nlml::<f64, SqExp>(&loghyper, &x, &y, &quiet_config());
        assert!(matches!(res, Err(LikelihoodError::DimensionMismatch(_))));
    }

    #[test]
    fn test_nlml_multi_single_instance() {
        let (x, y) = training_data();
        let config = quiet_config();
        let loghyper = array![0.3, -0.2];
        let total =
            nlml_multi::<f64, SqExp>(&loghyper, &[(x.clone(), y.clone())], &config).unwrap();
        let kernel = SqExp::from_params(&loghyper.mapv(f64::exp)).unwrap();
        let (single, _) = marginal_likelihood(&kernel, &x, &y, false, &config).unwrap();
        assert_eq!(total, single);
    }

    #[test]
    fn test_nlml_multi_accumulates() {
        let (x1, y1) = training_data();
        let x2 = array![[0.5], [1.5], [3.0], [4.5]];
        let y2 = array![0.2, 0.9, 0.4, -0.3];
        let config = quiet_config();
        let loghyper = array![0.0, 0.0];
        let total = nlml_multi::<f64, SqExp>(
            &loghyper,
            &[(x1.clone(), y1.clone()), (x2.clone(), y2.clone())],
            &config,
        )
        .unwrap();
        let first = nlml::<f64, SqExp>(&loghyper, &x1, &y1, &config).unwrap();
        let second = nlml::<f64, SqExp>(&loghyper, &x2, &y2, &config).unwrap();
        assert_abs_diff_eq!(total, first + second, epsilon = 1e-12);
    }

    #[test]
    fn test_nlml_multi_propagates_failure() {
        let (x1, y1) = training_data();
        let x_bad = array![[0.0], [0.0], [1.0]];
        let y_bad = array![0.5, 0.5, 1.0];
        let config = LikelihoodConfig {
            noise: 0.0,
            ..quiet_config()
        };
        let loghyper = array![0.0, 0.0];
        let res =
            nlml_multi::<f64, SqExp>(&loghyper, &[(x1, y1), (x_bad, y_bad)], &config);
        assert!(matches!(
            res,
            Err(LikelihoodError::NonPositiveDefinite { .. })
        ));
    }
}
