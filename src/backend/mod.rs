//! Backends that can render meshes.

pub mod autodiff;

pub use crate::render::mesh::{backward, cpu, forward};
pub use burn::tensor::{backend::Backend, ops::FloatTensor};

use crate::preset::backend::{NdArray, Wgpu};

/// A backend that can project, rasterize and bake meshes.
///
/// The default methods run the host kernels in [`cpu`] and discard the
/// cached values. [`Autodiff`](crate::preset::backend::Autodiff) keeps them
/// to compute the gradients.
pub trait MeshRenderBackend: Backend {
    /// Returns `[B, N, 3]`.
    fn project_mesh(input: forward::ProjectInput<Self>) -> FloatTensor<Self> {
        cpu::project_forward(input).screen_vertices
    }

    /// Returns `[B, I_y, I_x, C + 2]`.
    fn rasterize_mesh(input: forward::RasterizeInput<Self>) -> FloatTensor<Self> {
        cpu::rasterize_forward(input).images
    }

    /// Returns `[F, T³, C]`.
    fn bake_texture(input: forward::BakeInput<Self>) -> FloatTensor<Self> {
        cpu::bake_forward(input).textures
    }
}

impl MeshRenderBackend for NdArray {}

impl MeshRenderBackend for Wgpu {}
