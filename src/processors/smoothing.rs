//! Small isotropic smoothing kernel and same-shape 2D convolution.

use clap::ValueEnum;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// How the convolution treats samples that fall outside the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    /// Repeat the nearest edge value
    #[default]
    Clamp,
    /// Treat everything outside the field as zero
    Zero,
}

/// Square kernel of side `2 * radius + 1` with weights
/// `exp(-(dx^2 + dy^2) / radius)`, normalized to sum to 1.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    radius: usize,
    weights: Array2<f32>,
}

impl GaussianKernel {
    /// Build the kernel. A radius of 0 gives the identity kernel.
    pub fn new(radius: usize) -> Self {
        if radius == 0 {
            return Self {
                radius,
                weights: Array2::ones((1, 1)),
            };
        }

        let side = 2 * radius + 1;
        let r = radius as f64;
        let raw = Array2::from_shape_fn((side, side), |(i, j)| {
            let dy = i as f64 - r;
            let dx = j as f64 - r;
            (-(dx * dx + dy * dy) / r).exp()
        });
        let sum = raw.sum();
        let weights = raw.mapv(|w| (w / sum) as f32);

        Self { radius, weights }
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    #[inline]
    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    /// Convolve `input` with this kernel. The output has the input's shape.
    ///
    /// Rows are computed in parallel; every output cell sums its neighbours
    /// in the same fixed order, so repeated runs are bit-identical.
    pub fn convolve(&self, input: &Array2<f32>, edge: EdgeMode) -> Array2<f32> {
        if self.radius == 0 || input.is_empty() {
            return input.clone();
        }

        let (height, width) = input.dim();
        let r = self.radius as isize;
        let mut output = Array2::<f32>::zeros((height, width));

        Zip::indexed(&mut output).par_for_each(|(row, col), out| {
            let mut acc = 0.0f32;
            for ((ki, kj), &w) in self.weights.indexed_iter() {
                let sy = row as isize + ki as isize - r;
                let sx = col as isize + kj as isize - r;
                let value = match edge {
                    EdgeMode::Clamp => {
                        let cy = sy.clamp(0, height as isize - 1) as usize;
                        let cx = sx.clamp(0, width as isize - 1) as usize;
                        input[[cy, cx]]
                    }
                    EdgeMode::Zero => {
                        if sy < 0 || sx < 0 || sy >= height as isize || sx >= width as isize {
                            0.0
                        } else {
                            input[[sy as usize, sx as usize]]
                        }
                    }
                };
                acc += w * value;
            }
            *out = acc;
        });

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let kernel = GaussianKernel::new(1);
        let w = kernel.weights();

        assert_eq!(w.dim(), (3, 3));
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(w[[0, 0]], w[[2, 2]]);
        assert_relative_eq!(w[[0, 1]], w[[1, 0]]);
        assert!(w[[1, 1]] > w[[0, 1]]);
        assert!(w[[0, 1]] > w[[0, 0]]);
    }

    #[test]
    fn test_kernel_weights_match_formula() {
        let kernel = GaussianKernel::new(1);
        let w = kernel.weights();
        // center 1, edges e^-1, corners e^-2
        let e1 = (-1.0f64).exp();
        let e2 = (-2.0f64).exp();
        let sum = 1.0 + 4.0 * e1 + 4.0 * e2;

        assert_relative_eq!(w[[1, 1]] as f64, 1.0 / sum, epsilon = 1e-6);
        assert_relative_eq!(w[[0, 1]] as f64, e1 / sum, epsilon = 1e-6);
        assert_relative_eq!(w[[0, 0]] as f64, e2 / sum, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let input = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32);
        let out = GaussianKernel::new(0).convolve(&input, EdgeMode::Clamp);
        assert_eq!(out, input);
    }

    #[test]
    fn test_constant_field_preserved_with_clamp() {
        let input = Array2::from_elem((5, 6), 0.4f32);
        let out = GaussianKernel::new(1).convolve(&input, EdgeMode::Clamp);

        for &v in out.iter() {
            assert_relative_eq!(v, 0.4, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_padding_darkens_edges() {
        let input = Array2::from_elem((5, 5), 1.0f32);
        let out = GaussianKernel::new(1).convolve(&input, EdgeMode::Zero);

        assert_relative_eq!(out[[2, 2]], 1.0, epsilon = 1e-6);
        assert!(out[[0, 0]] < out[[0, 2]]);
        assert!(out[[0, 2]] < 1.0);
    }

    #[test]
    fn test_impulse_spreads_kernel() {
        let mut input = Array2::<f32>::zeros((5, 5));
        input[[2, 2]] = 1.0;
        let kernel = GaussianKernel::new(1);
        let out = kernel.convolve(&input, EdgeMode::Zero);

        assert_relative_eq!(out[[2, 2]], kernel.weights()[[1, 1]]);
        assert_relative_eq!(out[[1, 2]], kernel.weights()[[0, 1]]);
        assert_relative_eq!(out[[0, 0]], 0.0);
    }

    #[test]
    fn test_shape_preserved_for_thin_fields() {
        let input = Array2::from_elem((1, 7), 0.5f32);
        let out = GaussianKernel::new(2).convolve(&input, EdgeMode::Clamp);
        assert_eq!(out.dim(), (1, 7));
    }
}
