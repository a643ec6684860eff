//! Host kernels.
//!
//! Every kernel works on flat `f64` slices in row-major order and is
//! paired with a backward kernel consuming the cached forward values.

pub mod bake;
pub mod bake_backward;
pub mod composite;
pub mod project;
pub mod project_backward;
pub mod rasterize;
pub mod rasterize_backward;
pub mod texture;

pub use rayon::prelude::*;

/// A flat buffer for scatter-add accumulation of gradients.
///
/// Parallel passes fold into one buffer per job and merge them with
/// [`GradientBuffer::merge`], so no two threads write the same cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GradientBuffer {
    values: Vec<f64>,
}

impl GradientBuffer {
    #[inline]
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    #[inline]
    pub fn add(
        &mut self,
        index: usize,
        value: f64,
    ) {
        self.values[index] += value;
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element-wise sum of two buffers of the same length.
    pub fn merge(
        mut self,
        other: Self,
    ) -> Self {
        debug_assert_eq!(self.len(), other.len());
        self.values
            .iter_mut()
            .zip(other.values)
            .for_each(|(value, other)| *value += other);
        self
    }
}

/// Logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn merge() {
        use super::*;

        let mut a = GradientBuffer::zeros(3);
        a.add(0, 1.0);
        a.add(2, -2.0);
        let mut b = GradientBuffer::zeros(3);
        b.add(0, 0.5);
        b.add(1, 4.0);

        assert_eq!(a.merge(b).into_inner(), vec![1.5, 4.0, -2.0]);
    }

    #[test]
    fn sigmoid_saturates_without_overflow() {
        use super::*;

        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1.0e4).is_finite());
        assert!(sigmoid(-1.0e4).is_finite());
        assert!((sigmoid(3.0) + sigmoid(-3.0) - 1.0).abs() < 1e-12);
    }
}
