//! Cached 2D FFT plans over `ndarray` arrays of complex doubles.
//!
//! Plans are built once per grid and shared read-only across scan workers;
//! `rustfft` plan objects are `Send + Sync` so a single [`FftPlan2`] serves the
//! whole parallel loop. The forward transform is unnormalized and the inverse
//! carries the full `1/N` factor, matching the `numpy.fft` convention assumed
//! by the propagator and detector components.

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

pub struct FftPlan2 {
    shape: [usize; 2],
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl FftPlan2 {
    /// Plans forward and inverse transforms for arrays of the given shape.
    pub fn new(shape: [usize; 2]) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            shape,
            row_forward: planner.plan_fft(shape[1], FftDirection::Forward),
            row_inverse: planner.plan_fft(shape[1], FftDirection::Inverse),
            col_forward: planner.plan_fft(shape[0], FftDirection::Forward),
            col_inverse: planner.plan_fft(shape[0], FftDirection::Inverse),
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Unnormalized forward transform, in place.
    pub fn forward_inplace(&self, array: &mut Array2<Complex64>) {
        self.transform(array, &self.row_forward, &self.col_forward);
    }

    /// Inverse transform, in place, normalized by `1 / (n0 * n1)`.
    pub fn inverse_inplace(&self, array: &mut Array2<Complex64>) {
        self.transform(array, &self.row_inverse, &self.col_inverse);
        let norm = 1.0 / (self.shape[0] * self.shape[1]) as f64;
        array.mapv_inplace(|v| v * norm);
    }

    /// Forward transform into a fresh array.
    pub fn forward(&self, array: &Array2<Complex64>) -> Array2<Complex64> {
        let mut out = array.clone();
        self.forward_inplace(&mut out);
        out
    }

    fn transform(
        &self,
        array: &mut Array2<Complex64>,
        row_fft: &Arc<dyn Fft<f64>>,
        col_fft: &Arc<dyn Fft<f64>>,
    ) {
        debug_assert_eq!(array.dim(), (self.shape[0], self.shape[1]));
        let (n0, n1) = array.dim();

        let mut scratch = vec![
            Complex64::ZERO;
            row_fft
                .get_inplace_scratch_len()
                .max(col_fft.get_inplace_scratch_len())
        ];
        let mut line = vec![Complex64::ZERO; n0.max(n1)];

        for mut row in array.rows_mut() {
            match row.as_slice_mut() {
                Some(slice) => row_fft.process_with_scratch(slice, &mut scratch),
                None => {
                    let buf = &mut line[..n1];
                    for (dst, src) in buf.iter_mut().zip(row.iter()) {
                        *dst = *src;
                    }
                    row_fft.process_with_scratch(buf, &mut scratch);
                    for (dst, src) in row.iter_mut().zip(buf.iter()) {
                        *dst = *src;
                    }
                }
            }
        }

        let buf = &mut line[..n0];
        for j in 0..n1 {
            for i in 0..n0 {
                buf[i] = array[[i, j]];
            }
            col_fft.process_with_scratch(buf, &mut scratch);
            for i in 0..n0 {
                array[[i, j]] = buf[i];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn test_field(shape: (usize, usize)) -> Array2<Complex64> {
        Array2::from_shape_fn(shape, |(i, j)| {
            Complex64::new((i as f64 * 0.37).sin(), (j as f64 * 0.71).cos())
        })
    }

    #[test]
    fn forward_then_inverse_recovers_input() {
        let plan = FftPlan2::new([16, 24]);
        let original = test_field((16, 24));
        let mut field = original.clone();
        plan.forward_inplace(&mut field);
        plan.inverse_inplace(&mut field);
        for (a, b) in field.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn impulse_transforms_to_flat_spectrum() {
        let plan = FftPlan2::new([8, 8]);
        let mut field = Array2::from_elem((8, 8), Complex64::ZERO);
        field[[0, 0]] = Complex64::new(1.0, 0.0);
        plan.forward_inplace(&mut field);
        for v in field.iter() {
            assert!((v - Complex64::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn parseval_holds_for_unnormalized_forward() {
        let plan = FftPlan2::new([12, 12]);
        let field = test_field((12, 12));
        let real_sum: f64 = field.iter().map(|v| v.norm_sqr()).sum();
        let spectrum = plan.forward(&field);
        let fourier_sum: f64 = spectrum.iter().map(|v| v.norm_sqr()).sum();
        assert!((fourier_sum - 144.0 * real_sum).abs() < 1e-8 * fourier_sum);
    }
}
