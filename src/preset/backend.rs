pub use burn::backend::wgpu::WgpuDevice;

use burn::backend::{autodiff, ndarray, wgpu};

pub type Autodiff<B> = autodiff::Autodiff<B>;
pub type NdArray = ndarray::NdArray<f32>;
pub type Wgpu = wgpu::Wgpu<f32, i32>;
