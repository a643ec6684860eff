pub use super::*;

#[derive(Clone, Debug)]
pub struct ProjectInput<B: Backend> {
    pub arguments: kernel::project::Arguments,
    pub device: B::Device,
    /// `[B, 5]`
    pub distortion: B::FloatTensorPrimitive,
    /// `[B, 3, 3]`
    pub intrinsics: B::FloatTensorPrimitive,
    /// `[B, 3, 3]`
    pub rotation: B::FloatTensorPrimitive,
    /// `[B, 1, 3]`
    pub translation: B::FloatTensorPrimitive,
    /// `[B, N, 3]`
    pub vertices: B::FloatTensorPrimitive,
}

#[derive(Clone, Debug)]
pub struct ProjectOutput<B: Backend> {
    /// `[B, N, 3]`
    pub screen_vertices: B::FloatTensorPrimitive,
    pub state: backward::ProjectInput<B>,
}

#[derive(Clone, Debug)]
pub struct RasterizeInput<B: Backend> {
    pub arguments: kernel::rasterize::Arguments,
    /// `[C]`
    pub background: Vec<f64>,
    pub device: B::Device,
    /// `[B, F, 3, 3]`
    pub faces: B::FloatTensorPrimitive,
    /// `[B, F, T³, C]`
    pub textures: B::FloatTensorPrimitive,
}

#[derive(Clone, Debug)]
pub struct RasterizeOutput<B: Backend> {
    /// `[B, I_y, I_x, C + 2]`
    pub images: B::FloatTensorPrimitive,
    pub state: backward::RasterizeInput<B>,
}

#[derive(Clone, Debug)]
pub struct BakeInput<B: Backend> {
    pub arguments: kernel::bake::Arguments,
    pub device: B::Device,
    /// `[I_y, I_x, C]`
    pub image: B::FloatTensorPrimitive,
    /// `[F, 3, 2]`
    pub uv_layout: B::FloatTensorPrimitive,
}

#[derive(Clone, Debug)]
pub struct BakeOutput<B: Backend> {
    /// `[F, T³, C]`
    pub textures: B::FloatTensorPrimitive,
    pub state: backward::BakeInput<B>,
}
