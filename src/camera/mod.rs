//! Cameras with optimizable intrinsics, extrinsics and lens distortion.

pub mod look;

pub use crate::{
    backend::MeshRenderBackend, error::Error, function::TensorHostExtension,
};
pub use burn::{
    module::{Module, Param},
    tensor::{backend::Backend, Tensor},
};
pub use look::*;

use std::fmt;

/// A batch of `B` cameras.
///
/// A point `p` in the world is viewed at `p' = p * R^T + t`.
#[derive(Module)]
pub struct Camera<B: Backend> {
    /// `[B, 5]`, as `(k1, k2, p1, p2, k3)`
    pub distortion: Param<Tensor<B, 2>>,
    /// `[B, 3, 3]`
    pub intrinsics: Param<Tensor<B, 3>>,
    /// `[B, 3, 3]`
    pub rotation: Param<Tensor<B, 3>>,
    /// `[B, 1, 3]`
    pub translation: Param<Tensor<B, 3>>,
}

impl<B: Backend> Camera<B> {
    pub fn new(
        intrinsics: Tensor<B, 3>,
        rotation: Tensor<B, 3>,
        translation: Tensor<B, 3>,
        distortion: Tensor<B, 2>,
    ) -> Result<Self, Error> {
        let [batch_size, _, _] = intrinsics.dims();
        let shapes = [
            ("intrinsics", intrinsics.dims().to_vec(), vec![batch_size, 3, 3]),
            ("rotation", rotation.dims().to_vec(), vec![batch_size, 3, 3]),
            ("translation", translation.dims().to_vec(), vec![batch_size, 1, 3]),
            ("distortion", distortion.dims().to_vec(), vec![batch_size, 5]),
        ];
        if let Some((name, dims, expected)) =
            shapes.into_iter().find(|(_, dims, expected)| dims != expected)
        {
            return Err(Error::ShapeMismatch(
                format!("The shape of {name} ({dims:?})"),
                format!("{expected:?}"),
            ));
        }

        Ok(Self {
            distortion: Param::from_tensor(distortion),
            intrinsics: Param::from_tensor(intrinsics),
            rotation: Param::from_tensor(rotation),
            translation: Param::from_tensor(translation),
        })
    }

    /// A single camera without distortion at the origin, looking at `+z`.
    ///
    /// The image size is `2 * principal_point`.
    pub fn pinhole(
        focal_length: [f64; 2],
        principal_point: [f64; 2],
        device: &B::Device,
    ) -> Self {
        let [f_x, f_y] = focal_length;
        let [c_x, c_y] = principal_point;
        let intrinsics = Tensor::from_values(
            vec![f_x, 0.0, c_x, 0.0, f_y, c_y, 0.0, 0.0, 1.0],
            [1, 3, 3],
            device,
        );

        Self {
            distortion: Param::from_tensor(Tensor::zeros([1, 5], device)),
            intrinsics: Param::from_tensor(intrinsics),
            rotation: Param::from_tensor(Tensor::from_values(
                vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                [1, 3, 3],
                device,
            )),
            translation: Param::from_tensor(Tensor::zeros([1, 1, 3], device)),
        }
    }

    /// Replacing the extrinsics of a single camera.
    pub fn with_pose(
        mut self,
        pose: Pose,
    ) -> Self {
        let device = self.device();
        let (rotation, translation) = pose.into_tensors(&device);
        self.rotation = Param::from_tensor(rotation);
        self.translation = Param::from_tensor(translation);
        self
    }

    /// `B`
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.intrinsics.dims()[0]
    }

    #[inline]
    pub fn device(&self) -> B::Device {
        self.intrinsics.device()
    }

    /// Projecting the vertices `[B, N, 3]` to the normalized screen space.
    pub fn project(
        &self,
        vertices: Tensor<B, 3>,
        epsilon: f64,
    ) -> Result<Tensor<B, 3>, Error>
    where
        B: MeshRenderBackend,
    {
        crate::render::mesh::project(
            vertices,
            self.intrinsics.val(),
            self.rotation.val(),
            self.translation.val(),
            self.distortion.val(),
            epsilon,
        )
    }
}

impl<B: Backend> fmt::Debug for Camera<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("Camera")
            .field("devices", &self.devices())
            .field("distortion.dims()", &self.distortion.dims())
            .field("intrinsics.dims()", &self.intrinsics.dims())
            .field("rotation.dims()", &self.rotation.dims())
            .field("translation.dims()", &self.translation.dims())
            .finish()
    }
}
