//! Per-face texture grids.

pub mod image;

pub use crate::{
    backend::MeshRenderBackend,
    error::Error,
    mesh::{vertices_to_faces, Mesh},
    render::mesh::{forward, kernel},
};
pub use burn::{
    config::Config,
    tensor::{backend::Backend, Int, Tensor, TensorPrimitive},
};

use crate::function::TensorHostExtension;
use humansize::{format_size, BINARY};
use std::fmt;

/// Lookup of the image pixels while baking.
#[derive(Config, Copy, Debug, PartialEq, Eq)]
pub enum ImageFilter {
    Bilinear,
    Nearest,
}

/// Mapping of the UV coordinates outside `[0, 1]`.
#[derive(Config, Copy, Debug, PartialEq, Eq)]
pub enum TextureWrapping {
    ClampToEdge,
    Repeat,
}

#[derive(Config, Debug)]
pub struct BakeOptions {
    #[config(default = "ImageFilter::Bilinear")]
    pub filter: ImageFilter,

    #[config(default = "TextureWrapping::Repeat")]
    pub wrapping: TextureWrapping,
}

/// Sample grids of every face, indexed by the barycentric weights.
#[derive(Clone)]
pub struct TextureGrid<B: Backend> {
    /// `[F, T, T, T, C]`
    pub texels: Tensor<B, 5>,
}

impl<B: Backend> TextureGrid<B> {
    pub fn new(texels: Tensor<B, 5>) -> Result<Self, Error> {
        let [face_count, texture_size, _, _, channel_count] = texels.dims();
        let expected = [
            face_count,
            texture_size,
            texture_size,
            texture_size,
            channel_count,
        ];
        if texels.dims() != expected {
            return Err(Error::ShapeMismatch(
                format!("The shape of texels ({:?})", texels.dims()),
                format!("{expected:?}"),
            ));
        }
        if texture_size == 0 || channel_count == 0 {
            return Err(Error::Validation(
                format!(
                    "The texture size ({texture_size}) and channel count ({channel_count})"
                ),
                "positive".into(),
            ));
        }
        Ok(Self { texels })
    }

    /// Filling every texel of every face with the same color `[C]`.
    pub fn constant(
        face_count: usize,
        texture_size: usize,
        color: &[f64],
        device: &B::Device,
    ) -> Result<Self, Error> {
        let channel_count = color.len();
        let texels = Tensor::<B, 1>::from_values(color.to_vec(), [channel_count], device)
            .reshape([1, 1, 1, 1, channel_count])
            .expand([
                face_count,
                texture_size,
                texture_size,
                texture_size,
                channel_count,
            ]);
        Self::new(texels)
    }

    /// `C`
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.texels.dims()[4]
    }

    #[inline]
    pub fn device(&self) -> B::Device {
        self.texels.device()
    }

    /// `F`
    #[inline]
    pub fn face_count(&self) -> usize {
        self.texels.dims()[0]
    }

    /// `T`
    #[inline]
    pub fn texture_size(&self) -> usize {
        self.texels.dims()[1]
    }

    /// Number of bytes of the texels.
    #[inline]
    pub fn size(&self) -> usize {
        self.texels.dims().iter().product::<usize>() * size_of::<B::FloatElem>()
    }

    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }
}

impl<B: MeshRenderBackend> TextureGrid<B> {
    /// Baking the image with the texture coordinates of the mesh.
    pub fn from_image(
        mesh: &Mesh<B>,
        image: Tensor<B, 3>,
        texture_size: usize,
        options: &BakeOptions,
    ) -> Result<Self, Error> {
        let uv_layout = mesh.uvs.to_owned().ok_or_else(|| {
            Error::Validation("The texture coordinates of the mesh".into(), "set".into())
        })?;
        Self::new(bake_texture(uv_layout, image, texture_size, options)?)
    }

    /// Mixing the vertex colors `[N, C]` of the mesh.
    pub fn from_vertex_colors(
        mesh: &Mesh<B>,
        vertex_colors: Tensor<B, 2>,
        texture_size: usize,
    ) -> Result<Self, Error> {
        let [vertex_count, _] = vertex_colors.dims();
        if vertex_count != mesh.vertex_count() {
            return Err(Error::ShapeMismatch(
                format!("The shape of vertex colors ({:?})", vertex_colors.dims()),
                format!("[{}, C]", mesh.vertex_count()),
            ));
        }
        Self::new(bake_vertex_colors(
            mesh.faces.to_owned(),
            vertex_colors,
            texture_size,
        )?)
    }
}

/// Baking the image to the texture grids.
///
/// ## Arguments
///
/// * `uv_layout` - `[F, 3, 2]`
/// * `image` - `[I_y, I_x, C]`, the first row is the top of the image.
///
/// ## Returns
///
/// `[F, T, T, T, C]`
pub fn bake_texture<B: MeshRenderBackend>(
    uv_layout: Tensor<B, 3>,
    image: Tensor<B, 3>,
    texture_size: usize,
    options: &BakeOptions,
) -> Result<Tensor<B, 5>, Error> {
    let [face_count, _, _] = uv_layout.dims();
    let [image_size_y, image_size_x, channel_count] = image.dims();

    if uv_layout.dims() != [face_count, 3, 2] {
        return Err(Error::ShapeMismatch(
            format!("The shape of uv layout ({:?})", uv_layout.dims()),
            format!("[{face_count}, 3, 2]"),
        ));
    }
    if texture_size == 0 {
        return Err(Error::Validation(
            "The texture size (0)".into(),
            "positive".into(),
        ));
    }
    if image_size_x == 0 || image_size_y == 0 || channel_count == 0 {
        return Err(Error::Validation(
            format!("The shape of image ({:?})", image.dims()),
            "non-empty".into(),
        ));
    }

    let textures = B::bake_texture(forward::BakeInput {
        arguments: kernel::bake::Arguments {
            channel_count: channel_count as u32,
            face_count: face_count as u32,
            filter: options.filter.into(),
            image_size_x: image_size_x as u32,
            image_size_y: image_size_y as u32,
            texture_size: texture_size as u32,
            wrapping: options.wrapping.into(),
        },
        device: image.device(),
        image: image.into_primitive().tensor(),
        uv_layout: uv_layout.into_primitive().tensor(),
    });

    Ok(Tensor::<B, 3>::new(TensorPrimitive::Float(textures)).reshape([
        face_count,
        texture_size,
        texture_size,
        texture_size,
        channel_count,
    ]))
}

/// Mixing the vertex colors of every face into the texture grids.
///
/// ## Arguments
///
/// * `faces` - `[F, 3]`
/// * `vertex_colors` - `[N, C]`
///
/// ## Returns
///
/// `[F, T, T, T, C]`
pub fn bake_vertex_colors<B: Backend>(
    faces: Tensor<B, 2, Int>,
    vertex_colors: Tensor<B, 2>,
    texture_size: usize,
) -> Result<Tensor<B, 5>, Error> {
    let [face_count, _] = faces.dims();
    let [_, channel_count] = vertex_colors.dims();
    let texel_count = texture_size.pow(3);
    let device = vertex_colors.device();

    if texture_size == 0 {
        return Err(Error::Validation(
            "The texture size (0)".into(),
            "positive".into(),
        ));
    }

    // [F, 3, C]
    let colors = vertices_to_faces(vertex_colors.unsqueeze::<3>(), faces.unsqueeze::<3>())?
        .squeeze::<3>(0);
    // [F, T³, 3]
    let weights = Tensor::<B, 3>::from_values(
        (0..texel_count)
            .flat_map(|index| kernel::bake::texel_weights(texture_size, index))
            .collect(),
        [1, texel_count, 3],
        &device,
    )
    .expand([face_count, texel_count, 3]);

    Ok(weights.matmul(colors).reshape([
        face_count,
        texture_size,
        texture_size,
        texture_size,
        channel_count,
    ]))
}

impl From<ImageFilter> for kernel::bake::ImageFilter {
    fn from(filter: ImageFilter) -> Self {
        match filter {
            ImageFilter::Bilinear => Self::Bilinear,
            ImageFilter::Nearest => Self::Nearest,
        }
    }
}

impl From<TextureWrapping> for kernel::bake::Wrapping {
    fn from(wrapping: TextureWrapping) -> Self {
        match wrapping {
            TextureWrapping::ClampToEdge => Self::ClampToEdge,
            TextureWrapping::Repeat => Self::Repeat,
        }
    }
}

impl Default for ImageFilter {
    #[inline]
    fn default() -> Self {
        Self::Bilinear
    }
}

impl Default for TextureWrapping {
    #[inline]
    fn default() -> Self {
        Self::Repeat
    }
}

impl Default for BakeOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for TextureGrid<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct(&format!("TextureGrid<{}>", B::name()))
            .field("device", &self.device())
            .field("texels.dims()", &self.texels.dims())
            .finish()
    }
}
