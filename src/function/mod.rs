//! Moving tensors between the device and the host kernels.

use burn::tensor::{
    backend::Backend, ops::FloatTensor, Tensor, TensorData, TensorPrimitive,
};

pub trait TensorHostExtension<B: Backend, const D: usize> {
    /// Creating the tensor from the row-major values on the host.
    fn from_values(
        values: Vec<f64>,
        shape: [usize; D],
        device: &B::Device,
    ) -> Self;

    /// Reading the row-major values to the host.
    fn into_values(self) -> Vec<f64>;
}

impl<B: Backend, const D: usize> TensorHostExtension<B, D> for Tensor<B, D> {
    fn from_values(
        values: Vec<f64>,
        shape: [usize; D],
        device: &B::Device,
    ) -> Self {
        let data = TensorData::new(values, shape).convert::<B::FloatElem>();
        Tensor::from_data(data, device)
    }

    fn into_values(self) -> Vec<f64> {
        self.into_data().iter::<f64>().collect()
    }
}

/// Creating the primitive of a tensor of rank `D`.
#[inline]
pub fn from_values<B: Backend, const D: usize>(
    values: Vec<f64>,
    shape: [usize; D],
    device: &B::Device,
) -> FloatTensor<B> {
    Tensor::<B, D>::from_values(values, shape, device)
        .into_primitive()
        .tensor()
}

/// Reading the primitive of a tensor of rank `D`.
#[inline]
pub fn into_values<B: Backend, const D: usize>(
    tensor: FloatTensor<B>
) -> Vec<f64> {
    Tensor::<B, D>::new(TensorPrimitive::Float(tensor)).into_values()
}
