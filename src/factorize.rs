use ndarray::{Array1, Array2};
use ndarray_linalg::{JobSvd, SVDDCInto};
use std::error::Error;

/// A thread-safe wrapper for standard dynamic errors,
/// so they implement `Send` and `Sync`.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

/// Thin SVD factors of an m×n matrix: `matrix ≈ u · diag(sigma) · vᵗ`.
///
/// `sigma` holds the k = min(m, n) non-negative singular values in
/// descending order; `u` is m×k and `v` is n×k, both row-aligned with the
/// matrix they were factored from.
#[derive(Debug)]
pub struct SvdFactors {
    pub u: Array2<f64>,
    pub sigma: Array1<f64>,
    pub v: Array2<f64>,
}

/// Trait seam for the thin-SVD primitive.
///
/// The factor model treats factorization as an injected capability, so the
/// numerical backend can be swapped without redesigning the model itself.
/// Implementations must return factors satisfying the [`SvdFactors`]
/// contract and report convergence failure through the error channel.
pub trait SvdBackend {
    fn thin_svd(&self, matrix: Array2<f64>) -> Result<SvdFactors, ThreadSafeStdError>;
}

/// Thin SVD via `ndarray-linalg`'s divide-and-conquer LAPACK driver.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

impl SvdBackend for NdarrayLinAlgBackend {
    fn thin_svd(&self, matrix: Array2<f64>) -> Result<SvdFactors, ThreadSafeStdError> {
        let (u, sigma, vt) = matrix.svddc_into(JobSvd::Some)?;
        let u = u.ok_or("SVD backend did not return U")?;
        let vt = vt.ok_or("SVD backend did not return Vt")?;
        Ok(SvdFactors {
            u,
            sigma,
            v: vt.t().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn thin_factors_have_expected_shapes() {
        let matrix = array![[5.0, 3.0], [4.0, 0.0], [0.0, 1.0]];
        let factors = NdarrayLinAlgBackend.thin_svd(matrix).unwrap();

        assert_eq!(factors.u.dim(), (3, 2));
        assert_eq!(factors.sigma.len(), 2);
        assert_eq!(factors.v.dim(), (2, 2));
        assert!(factors.sigma[0] >= factors.sigma[1]);
        assert!(factors.sigma.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn factors_reconstruct_the_input() {
        let matrix = array![[5.0, 3.0], [4.0, 0.0]];
        let factors = NdarrayLinAlgBackend.thin_svd(matrix.clone()).unwrap();

        let reconstructed = factors
            .u
            .dot(&ndarray::Array2::from_diag(&factors.sigma))
            .dot(&factors.v.t());

        for (&expected, &actual) in matrix.iter().zip(reconstructed.iter()) {
            assert_abs_diff_eq!(expected, actual, epsilon = 1e-9);
        }
    }

    #[test]
    fn identity_has_unit_singular_values() {
        let factors = NdarrayLinAlgBackend
            .thin_svd(ndarray::Array2::eye(2))
            .unwrap();
        assert_abs_diff_eq!(factors.sigma[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(factors.sigma[1], 1.0, epsilon = 1e-12);
    }
}
