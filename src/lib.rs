//! This library computes the negative log marginal likelihood (NLML) of a
//! [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! regression model and its gradient with respect to each kernel
//! hyperparameter, for use by an external numerical optimizer performing
//! hyperparameter tuning.
//!
//! The training objective is the standard GP negative log likelihood
//! (eqn 5.8 of Rasmussen & Williams) decomposed into data-fit,
//! complexity-penalty and normalization terms:
//!
//! `nlml = 0.5 y' K^-1 y + 0.5 ln det K + 0.5 n ln(2 pi)`
//!
//! where `K` is the covariance matrix of the training inputs under a
//! [`Kernel`], conditioned with a small additive diagonal noise. The solve
//! goes through a Cholesky factorization by default, with a direct-inverse
//! reference path as fallback; see [`marginal_likelihood`]. The optimizer
//! facing surface ([`nlml`], [`dnlml`], [`nlml_multi`]) works in
//! log-hyperparameter space and handles the conversion to the linear-space
//! values kernels consume.
//!
//! Hyperparameter vectors driving the covariance matrix into numerical
//! non-positive-definiteness are appended to a diagnostic log file
//! (tab-separated timestamp, kernel tag and hyperparameter values) before the
//! failure is surfaced; the [`nlml`] entry point alone converts that failure
//! into a finite penalty value to keep a gradient-free optimizer loop alive.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use nlml::{dnlml, nlml, LikelihoodConfig, SquaredExponentialKernel};
//!
//! let x = array![[0.0], [1.0], [2.0]];
//! let y = array![0.0, 0.8, 0.1];
//! // log-space [length scale, amplitude]
//! let loghyper = array![0.0, 0.0];
//! let config = LikelihoodConfig::default();
//!
//! let objective = nlml::<f64, SquaredExponentialKernel<f64>>(&loghyper, &x, &y, &config)
//!     .expect("nlml evaluation");
//! let gradient = dnlml::<f64, SquaredExponentialKernel<f64>>(&loghyper, &x, &y, &config)
//!     .expect("dnlml evaluation");
//! assert!(objective.is_finite());
//! assert_eq!(gradient.len(), 2);
//! ```
mod errors;
mod kernels;
mod likelihood;
mod objective;
mod utils;

pub use errors::*;
pub use kernels::*;
pub use likelihood::*;
pub use objective::*;
