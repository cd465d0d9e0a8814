//! A module for covariance kernels parameterized by hyperparameters.
//!
//! The following kernels are implemented:
//! * squared exponential,
//! * matern 5/2.

use crate::errors::{LikelihoodError, Result};
use crate::utils::pairwise_sq_dists;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use std::fmt;

/// A trait for using a covariance kernel in marginal likelihood computations.
///
/// A kernel is built from a vector of linear-space hyperparameters and knows
/// how to evaluate its covariance matrix over a set of input points together
/// with the partial derivative of that matrix with respect to each
/// hyperparameter. The `Display` implementation acts as the kernel type tag
/// used in diagnostics.
pub trait Kernel<F: Float>: fmt::Display + Sized {
    /// Build a kernel instance from linear-space hyperparameters.
    ///
    /// Fails with [`LikelihoodError::DimensionMismatch`] when the number of
    /// given hyperparameters does not match the kernel family arity.
    fn from_params(params: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Self>;

    /// Current hyperparameter values, in the order used by [`Kernel::derivative`]
    fn params(&self) -> &Array1<F>;

    /// Number of hyperparameters of this kernel instance
    fn n_params(&self) -> usize {
        self.params().len()
    }

    /// Compute the symmetric positive semi-definite covariance matrix k(x, x')
    /// over the rows of `x`, as an (n, n) array
    fn cov_matrix(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F>;

    /// Compute the elementwise partial derivative of the covariance matrix
    /// with respect to the `i`-th hyperparameter.
    ///
    /// Panics if `i >= n_params()`.
    fn derivative(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>, i: usize) -> Array2<F>;
}

/// Squared exponential covariance kernel.
///
/// Hyperparameters `[l, s]` (length scale, amplitude):
///
/// `k(x, x') = s^2 exp( - |x - x'|^2 / (2 l^2) )`
#[derive(Clone, Debug)]
pub struct SquaredExponentialKernel<F: Float> {
    params: Array1<F>,
}

impl<F: Float> SquaredExponentialKernel<F> {
    fn length_scale(&self) -> F {
        self.params[0]
    }

    fn amplitude(&self) -> F {
        self.params[1]
    }
}

impl<F: Float> Kernel<F> for SquaredExponentialKernel<F> {
    fn from_params(params: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Self> {
        if params.len() != 2 {
            return Err(LikelihoodError::DimensionMismatch(format!(
                "SquaredExponential expects 2 hyperparameters (length scale, amplitude), got {}",
                params.len()
            )));
        }
        Ok(SquaredExponentialKernel {
            params: params.to_owned(),
        })
    }

    fn params(&self) -> &Array1<F> {
        &self.params
    }

    fn cov_matrix(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let l = self.length_scale();
        let s = self.amplitude();
        let two = F::cast(2.);
        pairwise_sq_dists(x).mapv(|d2| s * s * (-d2 / (two * l * l)).exp())
    }

    fn derivative(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>, i: usize) -> Array2<F> {
        let l = self.length_scale();
        let s = self.amplitude();
        let two = F::cast(2.);
        let d2_mx = pairwise_sq_dists(x);
        match i {
            // d k / d l = k * d2 / l^3
            0 => d2_mx.mapv(|d2| s * s * (-d2 / (two * l * l)).exp() * d2 / (l * l * l)),
            // d k / d s = 2 s exp(- d2 / (2 l^2))
            1 => d2_mx.mapv(|d2| two * s * (-d2 / (two * l * l)).exp()),
            _ => panic!("hyperparameter index {} out of range for {}", i, self),
        }
    }
}

impl<F: Float> fmt::Display for SquaredExponentialKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SquaredExponential")
    }
}

/// Matern 5/2 covariance kernel.
///
/// Hyperparameters `[l, s]` (length scale, amplitude); with `u = sqrt(5) r / l`
/// and `r = |x - x'|`:
///
/// `k(x, x') = s^2 (1 + u + u^2/3) exp(-u)`
#[derive(Clone, Debug)]
pub struct Matern52Kernel<F: Float> {
    params: Array1<F>,
}

impl<F: Float> Matern52Kernel<F> {
    fn length_scale(&self) -> F {
        self.params[0]
    }

    fn amplitude(&self) -> F {
        self.params[1]
    }
}

impl<F: Float> Kernel<F> for Matern52Kernel<F> {
    fn from_params(params: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Self> {
        if params.len() != 2 {
            return Err(LikelihoodError::DimensionMismatch(format!(
                "Matern52 expects 2 hyperparameters (length scale, amplitude), got {}",
                params.len()
            )));
        }
        Ok(Matern52Kernel {
            params: params.to_owned(),
        })
    }

    fn params(&self) -> &Array1<F> {
        &self.params
    }

    fn cov_matrix(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let l = self.length_scale();
        let s = self.amplitude();
        let sqrt5 = F::cast(5.).sqrt();
        let third = F::cast(1. / 3.);
        pairwise_sq_dists(x).mapv(|d2| {
            let u = sqrt5 * d2.sqrt() / l;
            s * s * (F::one() + u + third * u * u) * (-u).exp()
        })
    }

    fn derivative(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>, i: usize) -> Array2<F> {
        let l = self.length_scale();
        let s = self.amplitude();
        let sqrt5 = F::cast(5.).sqrt();
        let third = F::cast(1. / 3.);
        let two = F::cast(2.);
        let d2_mx = pairwise_sq_dists(x);
        match i {
            // d k / d l = s^2 u^2 (1 + u) exp(-u) / (3 l)
            0 => d2_mx.mapv(|d2| {
                let u = sqrt5 * d2.sqrt() / l;
                s * s * third * u * u * (F::one() + u) * (-u).exp() / l
            }),
            // d k / d s = 2 s (1 + u + u^2/3) exp(-u)
            1 => d2_mx.mapv(|d2| {
                let u = sqrt5 * d2.sqrt() / l;
                two * s * (F::one() + u + third * u * u) * (-u).exp()
            }),
            _ => panic!("hyperparameter index {} out of range for {}", i, self),
        }
    }
}

impl<F: Float> fmt::Display for Matern52Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matern52")
    }
}
