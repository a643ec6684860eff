pub use super::*;

/// The values cached by the projection on the host.
#[derive(Clone, Debug)]
pub struct ProjectInput<B: Backend> {
    pub arguments: kernel::project::Arguments,
    pub device: B::Device,
    /// `[B, 5]`
    pub distortion: Vec<f64>,
    /// `[B, 3, 3]`
    pub intrinsics: Vec<f64>,
    /// `[B, 3, 3]`
    pub rotation: Vec<f64>,
    /// `[B, 1, 3]`
    pub translation: Vec<f64>,
    /// `[B, N, 3]`
    pub vertices: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct ProjectOutput<B: Backend> {
    /// `[B, 5]`
    pub distortion_grad: B::FloatTensorPrimitive,
    /// `[B, 3, 3]`
    pub intrinsics_grad: B::FloatTensorPrimitive,
    /// `[B, 3, 3]`
    pub rotation_grad: B::FloatTensorPrimitive,
    /// `[B, 1, 3]`
    pub translation_grad: B::FloatTensorPrimitive,
    /// `[B, N, 3]`
    pub vertices_grad: B::FloatTensorPrimitive,
}

/// The values cached by the rasterization on the host.
#[derive(Clone, Debug)]
pub struct RasterizeInput<B: Backend> {
    pub arguments: kernel::rasterize::Arguments,
    /// `[C]`
    pub background: Vec<f64>,
    /// `[B, I_y, I_x]`
    pub depth_maxima: Vec<f64>,
    pub device: B::Device,
    /// `[B, F, 3, 3]`
    pub faces: Vec<f64>,
    /// `[B, I_y, I_x, C + 2]`
    pub images: Vec<f64>,
    /// `[B, I_y, I_x]`
    pub normalizers: Vec<f64>,
    /// `[B, F, T³, C]`
    pub textures: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct RasterizeOutput<B: Backend> {
    /// `[B, F, 3, 3]`
    pub faces_grad: B::FloatTensorPrimitive,
    /// `[B, F, T³, C]`
    pub textures_grad: B::FloatTensorPrimitive,
}

#[derive(Clone, Debug)]
pub struct BakeInput<B: Backend> {
    pub arguments: kernel::bake::Arguments,
    pub device: B::Device,
    /// `[F, 3, 2]`
    pub uv_layout: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct BakeOutput<B: Backend> {
    /// `[I_y, I_x, C]`
    pub image_grad: B::FloatTensorPrimitive,
}
