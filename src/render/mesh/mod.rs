//! Differentiable rendering of triangle meshes.
//!
//! The pipeline projects the vertices to the normalized screen space,
//! gathers them into faces and rasterizes the faces with soft coverage and
//! soft depth ordering, so every output pixel has gradients with respect to
//! the geometry, the camera and the textures.

pub mod backward;
pub mod cpu;
pub mod forward;

pub use crate::{
    backend::MeshRenderBackend,
    camera::Camera,
    error::Error,
    mesh::{vertices_to_faces, Mesh},
    preset::render::*,
    texture::TextureGrid,
};
pub use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
pub use cpu::kernel;

use crate::function::TensorHostExtension;
use burn::tensor::{module::avg_pool2d, TensorPrimitive};
use std::fmt;

/// Interpolation of the texture grid within a face.
#[derive(Config, Copy, Debug, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Trilinear,
}

#[derive(Config, Debug)]
pub struct MeshRenderOptions {
    /// Rendering at twice the image size and averaging every `2 x 2` pixels.
    #[config(default = "false")]
    pub anti_aliasing: bool,

    /// `[C]`, black if unset.
    pub background_color: Option<Vec<f64>>,

    /// `θ`, it should be in `(0, 0.5)`.
    #[config(default = "COVERAGE_THRESHOLD")]
    pub coverage_threshold: f64,

    #[config(default = "DEPTH_FAR")]
    pub depth_far: f64,

    #[config(default = "DEPTH_NEAR")]
    pub depth_near: f64,

    /// `γ`, smaller is closer to a hard depth test.
    #[config(default = "DEPTH_SOFTNESS")]
    pub depth_softness: f64,

    /// `I_x`
    #[config(default = "IMAGE_SIZE")]
    pub image_size_x: u32,

    /// `I_y`
    #[config(default = "IMAGE_SIZE")]
    pub image_size_y: u32,

    #[config(default = "PROJECTION_EPSILON")]
    pub projection_epsilon: f64,

    /// `σ`, in inverse pixels of the output image.
    ///
    /// Larger is closer to a hard rasterizer.
    #[config(default = "SHARPNESS")]
    pub sharpness: f64,

    #[config(default = "TextureFilter::Trilinear")]
    pub texture_filter: TextureFilter,
}

#[derive(Clone)]
pub struct MeshRenderOutput<B: Backend> {
    /// `[B, C, I_y, I_x]`
    pub colors: Tensor<B, 4>,
    /// `[B, I_y, I_x]`
    pub depths: Tensor<B, 3>,
    /// `[B, I_y, I_x]`
    pub silhouettes: Tensor<B, 3>,
}

/// Rendering meshes with a fixed set of options.
#[derive(Clone, Debug, Default)]
pub struct MeshRenderer {
    pub options: MeshRenderOptions,
}

impl MeshRenderer {
    pub fn new(options: MeshRenderOptions) -> Self {
        Self { options }
    }

    /// Rendering the textured mesh from every camera in the batch.
    pub fn render<B: MeshRenderBackend>(
        &self,
        mesh: &Mesh<B>,
        camera: &Camera<B>,
        textures: &TextureGrid<B>,
    ) -> Result<MeshRenderOutput<B>, Error> {
        self.validate(mesh, textures)?;

        #[cfg(debug_assertions)]
        log::debug!(
            target: "softmesh::renderer::mesh",
            "render > {} face(s) > {} camera(s) > textures ({})",
            mesh.face_count(),
            camera.batch_size(),
            textures.size_readable(),
        );

        let batch_size = camera.batch_size();
        let face_count = mesh.face_count();
        let vertex_count = mesh.vertex_count();

        // [B, N, 3] <- [N, 3]
        let vertices = mesh
            .vertices
            .to_owned()
            .unsqueeze::<3>()
            .expand([batch_size, vertex_count, 3]);
        let screen_vertices =
            camera.project(vertices, self.options.projection_epsilon)?;

        // [B, F, 3] <- [F, 3]
        let faces = mesh
            .faces
            .to_owned()
            .unsqueeze::<3>()
            .expand([batch_size, face_count, 3]);
        let faces = vertices_to_faces(screen_vertices, faces)?;

        // [B, F, T, T, T, C] <- [F, T, T, T, C]
        let [_, texture_size, _, _, channel_count] = textures.texels.dims();
        let texels = textures.texels.to_owned().unsqueeze::<6>().expand([
            batch_size,
            face_count,
            texture_size,
            texture_size,
            texture_size,
            channel_count,
        ]);

        rasterize(faces, texels, &self.options)
    }
}

impl MeshRenderer {
    /// Checking that the textures fit the mesh and the options.
    pub fn validate<B: Backend>(
        &self,
        mesh: &Mesh<B>,
        textures: &TextureGrid<B>,
    ) -> Result<(), Error> {
        let [face_count, texture_size, _, _, channel_count] = textures.texels.dims();
        let expected = [
            mesh.face_count(),
            texture_size,
            texture_size,
            texture_size,
            channel_count,
        ];
        if textures.texels.dims() != expected {
            return Err(Error::ShapeMismatch(
                format!(
                    "The shape of texels ({:?}) for {} face(s)",
                    textures.texels.dims(),
                    face_count
                ),
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
        self.options.validate(channel_count)
    }
}

/// Projecting the vertices to the normalized screen space.
///
/// ## Arguments
///
/// * `vertices` - `[B, N, 3]`
/// * `intrinsics` - `[B, 3, 3]`
/// * `rotation` - `[B, 3, 3]`
/// * `translation` - `[B, 1, 3]`
/// * `distortion` - `[B, 5]`, as `(k1, k2, p1, p2, k3)`
///
/// ## Returns
///
/// `[B, N, 3]`, as `(u, v, depth)`
///
/// ## Details
///
/// Every camera is normalized by the principal point of the first camera,
/// which is taken as the center of the image.
pub fn project<B: MeshRenderBackend>(
    vertices: Tensor<B, 3>,
    intrinsics: Tensor<B, 3>,
    rotation: Tensor<B, 3>,
    translation: Tensor<B, 3>,
    distortion: Tensor<B, 2>,
    epsilon: f64,
) -> Result<Tensor<B, 3>, Error> {
    let [batch_size, vertex_count, _] = vertices.dims();

    if batch_size == 0 {
        return Err(Error::Validation(
            "The batch size".into(),
            "positive".into(),
        ));
    }
    check_shape("vertices", vertices.dims(), [batch_size, vertex_count, 3])?;
    check_shape("intrinsics", intrinsics.dims(), [batch_size, 3, 3])?;
    check_shape("rotation", rotation.dims(), [batch_size, 3, 3])?;
    check_shape("translation", translation.dims(), [batch_size, 1, 3])?;
    check_shape("distortion", distortion.dims(), [batch_size, 5])?;
    if !(epsilon.is_finite() && epsilon >= 0.0) {
        return Err(Error::Validation(
            format!("The projection epsilon ({epsilon})"),
            "finite and non-negative".into(),
        ));
    }

    let principal_point =
        intrinsics.to_owned().slice([0..1, 0..2, 2..3]).into_values();
    if !principal_point.iter().all(|p| p.is_finite() && *p > 0.0) {
        return Err(Error::Validation(
            format!("The principal point of the first camera ({principal_point:?})"),
            "positive".into(),
        ));
    }

    let screen_vertices = B::project_mesh(forward::ProjectInput {
        arguments: kernel::project::Arguments {
            batch_size: batch_size as u32,
            epsilon,
            vertex_count: vertex_count as u32,
        },
        device: vertices.device(),
        distortion: distortion.into_primitive().tensor(),
        intrinsics: intrinsics.into_primitive().tensor(),
        rotation: rotation.into_primitive().tensor(),
        translation: translation.into_primitive().tensor(),
        vertices: vertices.into_primitive().tensor(),
    });

    Ok(Tensor::new(TensorPrimitive::Float(screen_vertices)))
}

/// Rasterizing the faces in the normalized screen space.
///
/// ## Arguments
///
/// * `faces` - `[B, F, 3, 3]`, as `(u, v, depth)` per vertex
/// * `textures` - `[B, F, T, T, T, C]`
pub fn rasterize<B: MeshRenderBackend>(
    faces: Tensor<B, 4>,
    textures: Tensor<B, 6>,
    options: &MeshRenderOptions,
) -> Result<MeshRenderOutput<B>, Error> {
    let [batch_size, face_count, _, _] = faces.dims();
    let [_, _, texture_size, _, _, channel_count] = textures.dims();

    if batch_size == 0 {
        return Err(Error::Validation(
            "The batch size".into(),
            "positive".into(),
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
    check_shape("faces", faces.dims(), [batch_size, face_count, 3, 3])?;
    check_shape(
        "textures",
        textures.dims(),
        [
            batch_size,
            face_count,
            texture_size,
            texture_size,
            texture_size,
            channel_count,
        ],
    )?;
    options.validate(channel_count)?;

    // T³
    let texel_count = texture_size.pow(3);
    let scale = if options.anti_aliasing { 2 } else { 1 };
    let arguments = kernel::rasterize::Arguments {
        batch_size: batch_size as u32,
        channel_count: channel_count as u32,
        coverage_threshold: options.coverage_threshold,
        depth_far: options.depth_far,
        depth_near: options.depth_near,
        depth_softness: options.depth_softness,
        face_count: face_count as u32,
        image_size_x: options.image_size_x * scale,
        image_size_y: options.image_size_y * scale,
        sharpness: options.sharpness / scale as f64,
        texture_filter: options.texture_filter.into(),
        texture_size: texture_size as u32,
    };

    let images = B::rasterize_mesh(forward::RasterizeInput {
        arguments,
        background: options.background(channel_count),
        device: faces.device(),
        faces: faces.into_primitive().tensor(),
        textures: textures
            .reshape([batch_size, face_count, texel_count, channel_count])
            .into_primitive()
            .tensor(),
    });

    // [B, C + 2, I_y, I_x] <- [B, I_y, I_x, C + 2]
    let mut images = Tensor::<B, 4>::new(TensorPrimitive::Float(images))
        .swap_dims(2, 3)
        .swap_dims(1, 2);
    if options.anti_aliasing {
        images = avg_pool2d(images, [2, 2], [2, 2], [0, 0], true);
    }
    let [_, _, image_size_y, image_size_x] = images.dims();

    let channel = |range: std::ops::Range<usize>| {
        images
            .to_owned()
            .slice([0..batch_size, range, 0..image_size_y, 0..image_size_x])
    };
    let colors = channel(0..channel_count);
    let depths = channel(channel_count..channel_count + 1).squeeze::<3>(1);
    let silhouettes =
        channel(channel_count + 1..channel_count + 2).squeeze::<3>(1);

    Ok(MeshRenderOutput {
        colors,
        depths,
        silhouettes,
    })
}

fn check_shape<const D: usize>(
    name: &str,
    dims: [usize; D],
    expected: [usize; D],
) -> Result<(), Error> {
    if dims != expected {
        return Err(Error::ShapeMismatch(
            format!("The shape of {name} ({dims:?})"),
            format!("{expected:?}"),
        ));
    }
    Ok(())
}

impl MeshRenderOptions {
    /// The background color with `C` channels.
    pub fn background(
        &self,
        channel_count: usize,
    ) -> Vec<f64> {
        self.background_color
            .to_owned()
            .unwrap_or_else(|| vec![0.0; channel_count])
    }

    /// Checking the options for rendering `C` channels.
    pub fn validate(
        &self,
        channel_count: usize,
    ) -> Result<(), Error> {
        let is_positive = |value: f64| value.is_finite() && value > 0.0;

        if self.image_size_x == 0 || self.image_size_y == 0 {
            return Err(Error::Validation(
                format!(
                    "The image size ({} x {})",
                    self.image_size_x, self.image_size_y
                ),
                "positive".into(),
            ));
        }
        if !is_positive(self.sharpness) {
            return Err(Error::Validation(
                format!("The sharpness ({})", self.sharpness),
                "positive".into(),
            ));
        }
        if !is_positive(self.depth_softness) {
            return Err(Error::Validation(
                format!("The depth softness ({})", self.depth_softness),
                "positive".into(),
            ));
        }
        if !(is_positive(self.depth_near)
            && is_positive(self.depth_far)
            && self.depth_near < self.depth_far)
        {
            return Err(Error::Validation(
                format!(
                    "The depth range ({} ~ {})",
                    self.depth_near, self.depth_far
                ),
                "positive and increasing".into(),
            ));
        }
        if !(self.coverage_threshold > 0.0 && self.coverage_threshold < 0.5) {
            return Err(Error::Validation(
                format!("The coverage threshold ({})", self.coverage_threshold),
                "in (0, 0.5)".into(),
            ));
        }
        if !(self.projection_epsilon.is_finite() && self.projection_epsilon >= 0.0)
        {
            return Err(Error::Validation(
                format!("The projection epsilon ({})", self.projection_epsilon),
                "finite and non-negative".into(),
            ));
        }
        if let Some(background_color) = &self.background_color {
            if background_color.len() != channel_count {
                return Err(Error::ShapeMismatch(
                    format!(
                        "The channel count of background color ({})",
                        background_color.len()
                    ),
                    channel_count.to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for MeshRenderOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TextureFilter {
    #[inline]
    fn default() -> Self {
        Self::Trilinear
    }
}

impl From<TextureFilter> for kernel::texture::Filter {
    fn from(filter: TextureFilter) -> Self {
        match filter {
            TextureFilter::Nearest => Self::Nearest,
            TextureFilter::Trilinear => Self::Trilinear,
        }
    }
}

impl<B: Backend> fmt::Debug for MeshRenderOutput<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("MeshRenderOutput<{}>", B::name()))
            .field("colors.dims()", &self.colors.dims())
            .field("depths.dims()", &self.depths.dims())
            .field("silhouettes.dims()", &self.silhouettes.dims())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::TensorHostExtension,
        preset::backend::{Autodiff, NdArray},
    };

    fn pinhole_camera<B: Backend>(
        device: &B::Device
    ) -> [Tensor<B, 3>; 3] {
        [
            Tensor::from_values(
                vec![32.0, 0.0, 16.0, 0.0, 32.0, 16.0, 0.0, 0.0, 1.0],
                [1, 3, 3],
                device,
            ),
            Tensor::from_values(
                vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                [1, 3, 3],
                device,
            ),
            Tensor::from_values(vec![0.0, 0.0, 2.0], [1, 1, 3], device),
        ]
    }

    #[test]
    fn project_checks_shapes() {
        let device = Default::default();
        let [intrinsics, rotation, translation] = pinhole_camera::<NdArray>(&device);
        let vertices = Tensor::<NdArray, 3>::zeros([1, 4, 3], &device);

        let result = project(
            vertices.to_owned(),
            intrinsics.to_owned(),
            rotation.to_owned(),
            translation.to_owned(),
            Tensor::zeros([2, 5], &device),
            PROJECTION_EPSILON,
        );
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");

        let result = project(
            vertices,
            intrinsics.zeros_like(),
            rotation,
            translation,
            Tensor::zeros([1, 5], &device),
            PROJECTION_EPSILON,
        );
        assert!(matches!(result, Err(Error::Validation(_, _))), "{result:?}");
    }

    #[test]
    fn rasterize_checks_options() {
        let device = Default::default();
        let faces = Tensor::<NdArray, 4>::zeros([1, 2, 3, 3], &device);
        let textures = Tensor::<NdArray, 6>::zeros([1, 2, 1, 1, 1, 3], &device);

        let options = MeshRenderOptions::new().with_depth_near(0.0);
        let result = rasterize(faces.to_owned(), textures.to_owned(), &options);
        assert!(matches!(result, Err(Error::Validation(_, _))), "{result:?}");

        let options = MeshRenderOptions::new().with_background_color(Some(vec![1.0]));
        let result = rasterize(faces.to_owned(), textures.to_owned(), &options);
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");

        let result = rasterize(
            faces,
            Tensor::zeros([1, 3, 1, 1, 1, 3], &device),
            &MeshRenderOptions::new(),
        );
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");
    }

    #[test]
    fn render_checks_textures_against_mesh() {
        let device = Default::default();
        let vertices = Tensor::<NdArray, 2>::from_values(
            vec![-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0],
            [3, 3],
            &device,
        );
        let mesh = Mesh::new(vertices, Tensor::from_ints([[0, 1, 2]], &device)).unwrap();
        let camera = Camera::pinhole([32.0, 32.0], [16.0, 16.0], &device);
        let renderer = MeshRenderer::default();

        let textures = TextureGrid::constant(2, 2, &[1.0, 1.0, 1.0], &device).unwrap();
        let result = renderer.render(&mesh, &camera, &textures);
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");

        let textures = TextureGrid {
            texels: Tensor::zeros([1, 2, 2, 3, 3], &device),
        };
        let result = renderer.render(&mesh, &camera, &textures);
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");

        let textures = TextureGrid::constant(1, 2, &[1.0, 1.0], &device).unwrap();
        let renderer = MeshRenderer::new(
            MeshRenderOptions::new().with_background_color(Some(vec![0.0; 3])),
        );
        let result = renderer.render(&mesh, &camera, &textures);
        assert!(matches!(result, Err(Error::ShapeMismatch(_, _))), "{result:?}");
    }

    #[test]
    fn rasterize_without_faces_shows_background() {
        let device = Default::default();
        let options = MeshRenderOptions::new()
            .with_image_size_x(8)
            .with_image_size_y(6)
            .with_background_color(Some(vec![0.25, 0.5]));

        let output = rasterize(
            Tensor::<NdArray, 4>::zeros([2, 0, 3, 3], &device),
            Tensor::zeros([2, 0, 2, 2, 2, 2], &device),
            &options,
        );
        let output = output.unwrap();

        assert_eq!(output.colors.dims(), [2, 2, 6, 8]);
        assert_eq!(output.depths.dims(), [2, 6, 8]);
        assert_eq!(output.silhouettes.dims(), [2, 6, 8]);
        let colors = output.colors.into_values();
        assert!(colors[..48].iter().all(|&c| (c - 0.25).abs() < 1e-6));
        assert!(colors[48..96].iter().all(|&c| (c - 0.5).abs() < 1e-6));
        let depths = output.depths.into_values();
        assert!(depths.iter().all(|&d| (d - DEPTH_FAR).abs() < 1e-3));
        assert!(output.silhouettes.into_values().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn anti_aliasing_keeps_the_image_size() {
        let device = Default::default();
        let faces = Tensor::<NdArray, 4>::from_values(
            vec![-0.6, -0.6, 2.0, 0.7, -0.5, 2.0, 0.0, 0.8, 2.0],
            [1, 1, 3, 3],
            &device,
        );
        let textures = Tensor::<NdArray, 6>::ones([1, 1, 1, 1, 1, 1], &device);
        let options = MeshRenderOptions::new()
            .with_anti_aliasing(true)
            .with_image_size_x(10)
            .with_image_size_y(12)
            .with_sharpness(8.0);

        let output = rasterize(faces, textures, &options).unwrap();

        assert_eq!(output.colors.dims(), [1, 1, 12, 10]);
        let silhouettes = output.silhouettes.into_values();
        // The center is covered
        assert!(silhouettes[6 * 10 + 5] > 0.99, "{silhouettes:?}");
        assert!(silhouettes[0] < 0.01, "{silhouettes:?}");
    }

    #[test]
    fn gradients_flow_to_faces_and_textures() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let faces = Tensor::<B, 4>::from_values(
            vec![-0.6, -0.6, 2.0, 0.7, -0.5, 2.5, 0.0, 0.8, 3.0],
            [1, 1, 3, 3],
            &device,
        )
        .require_grad();
        let textures = Tensor::<B, 6>::ones([1, 1, 2, 2, 2, 3], &device)
            .mul_scalar(0.5)
            .require_grad();
        let options = MeshRenderOptions::new()
            .with_image_size_x(16)
            .with_image_size_y(16)
            .with_sharpness(1.0);

        let output = rasterize(faces.to_owned(), textures.to_owned(), &options).unwrap();
        let grads = (output.colors.sum() + output.silhouettes.sum()).backward();

        let faces_grad = faces.grad(&grads).unwrap().into_values();
        let textures_grad = textures.grad(&grads).unwrap().into_values();
        assert_eq!(faces_grad.len(), 9);
        assert_eq!(textures_grad.len(), 24);
        assert!(faces_grad.iter().all(|g| g.is_finite()));
        assert!(faces_grad.iter().any(|g| g.abs() > 1e-6), "{faces_grad:?}");
        assert!(textures_grad.iter().all(|&g| g >= 0.0));
        assert!(textures_grad.iter().any(|&g| g > 1e-6), "{textures_grad:?}");
    }
}
