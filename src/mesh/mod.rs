//! Triangle meshes.

pub mod export;
pub mod import;

pub use crate::{error::Error, function::TensorHostExtension};
pub use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};

use humansize::{format_size, BINARY};
use std::fmt;

#[derive(Clone)]
pub struct Mesh<B: Backend> {
    /// `[F, 3]`
    pub faces: Tensor<B, 2, Int>,
    /// `[F, 3, 2]`, the texture coordinates of every face corner.
    pub uvs: Option<Tensor<B, 3>>,
    /// `[N, 3]`
    pub vertices: Tensor<B, 2>,
}

impl<B: Backend> Mesh<B> {
    /// Creating a mesh after checking the shapes and the face indices.
    pub fn new(
        vertices: Tensor<B, 2>,
        faces: Tensor<B, 2, Int>,
    ) -> Result<Self, Error> {
        let [vertex_count, vertex_dim] = vertices.dims();
        let [face_count, face_dim] = faces.dims();
        if vertex_dim != 3 {
            return Err(Error::ShapeMismatch(
                format!("The shape of vertices ({:?})", vertices.dims()),
                format!("[{vertex_count}, 3]"),
            ));
        }
        if face_dim != 3 {
            return Err(Error::ShapeMismatch(
                format!("The shape of faces ({:?})", faces.dims()),
                format!("[{face_count}, 3]"),
            ));
        }
        check_indices(faces.to_owned().flatten::<1>(0, 1), vertex_count)?;

        Ok(Self {
            faces,
            uvs: None,
            vertices,
        })
    }

    /// Attaching the texture coordinates `[F, 3, 2]`.
    pub fn with_uvs(
        mut self,
        uvs: Tensor<B, 3>,
    ) -> Result<Self, Error> {
        let expected = [self.face_count(), 3, 2];
        if uvs.dims() != expected {
            return Err(Error::ShapeMismatch(
                format!("The shape of uvs ({:?})", uvs.dims()),
                format!("{expected:?}"),
            ));
        }
        self.uvs = Some(uvs);
        Ok(self)
    }

    #[inline]
    pub fn device(&self) -> B::Device {
        self.vertices.device()
    }

    /// `F`
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.dims()[0]
    }

    /// `N`
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.dims()[0]
    }

    /// Number of bytes of the vertices and the texture coordinates.
    #[inline]
    pub fn size(&self) -> usize {
        let float_count = self.vertices.dims().iter().product::<usize>()
            + self
                .uvs
                .as_ref()
                .map_or(0, |uvs| uvs.dims().iter().product::<usize>());
        float_count * size_of::<B::FloatElem>()
            + self.faces.dims().iter().product::<usize>() * size_of::<B::IntElem>()
    }

    /// Readable size of the mesh.
    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }

    /// Gathering the vertices of every face, `[F, 3, 3]`.
    pub fn faces_vertices(&self) -> Result<Tensor<B, 3>, Error> {
        Ok(vertices_to_faces(
            self.vertices.to_owned().unsqueeze::<3>(),
            self.faces.to_owned().unsqueeze::<3>(),
        )?
        .squeeze::<3>(0))
    }
}

/// Gathering the vertices of every face.
///
/// ## Arguments
///
/// * `vertices` - `[B, N, D]`
/// * `faces` - `[B, F, 3]`
///
/// ## Returns
///
/// `[B, F, 3, D]`
pub fn vertices_to_faces<B: Backend>(
    vertices: Tensor<B, 3>,
    faces: Tensor<B, 3, Int>,
) -> Result<Tensor<B, 4>, Error> {
    let [batch_size, vertex_count, vertex_dim] = vertices.dims();
    let [face_batch_size, face_count, face_dim] = faces.dims();
    if face_batch_size != batch_size || face_dim != 3 {
        return Err(Error::ShapeMismatch(
            format!("The shape of faces ({:?})", faces.dims()),
            format!("[{batch_size}, {face_count}, 3]"),
        ));
    }

    let device = vertices.device();
    let indices = faces.flatten::<1>(0, 2);
    check_indices(indices.to_owned(), vertex_count)?;

    // [B * F * 3] <- [B * F * 3] + [B, 1] * N
    let offsets = Tensor::<B, 1, Int>::arange(0..batch_size as i64, &device)
        .mul_scalar(vertex_count as i64)
        .unsqueeze_dim::<2>(1)
        .repeat_dim(1, face_count * 3)
        .flatten::<1>(0, 1);
    let indices = indices + offsets;

    Ok(vertices
        .reshape([batch_size * vertex_count, vertex_dim])
        .select(0, indices)
        .reshape([batch_size, face_count, 3, vertex_dim]))
}

fn check_indices<B: Backend>(
    indices: Tensor<B, 1, Int>,
    vertex_count: usize,
) -> Result<(), Error> {
    if indices.dims()[0] == 0 {
        return Ok(());
    }
    let min = indices.to_owned().min().into_scalar().elem::<i64>();
    let max = indices.max().into_scalar().elem::<i64>();
    if min < 0 || max >= vertex_count as i64 {
        return Err(Error::Validation(
            format!("The face indices ({min} ~ {max})"),
            format!("in [0, {vertex_count})"),
        ));
    }
    Ok(())
}

impl<B: Backend> fmt::Debug for Mesh<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("device", &self.device())
            .field("faces.dims()", &self.faces.dims())
            .field("uvs.dims()", &self.uvs.as_ref().map(|uvs| uvs.dims()))
            .field("vertices.dims()", &self.vertices.dims())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::backend::{Autodiff, NdArray};

    fn quad<B: Backend>(device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 2, Int>) {
        let vertices = Tensor::from_values(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            [4, 3],
            device,
        );
        let faces = Tensor::from_ints([[0, 1, 2], [0, 2, 3]], device);
        (vertices, faces)
    }

    #[test]
    fn new_checks_indices() {
        let device = Default::default();
        let (vertices, _) = quad::<NdArray>(&device);

        let mesh = Mesh::new(vertices.to_owned(), Tensor::from_ints([[0, 1, 4]], &device));
        assert!(matches!(mesh, Err(Error::Validation(_, _))));

        let mesh = Mesh::new(vertices, Tensor::from_ints([[0, -1, 2]], &device));
        assert!(matches!(mesh, Err(Error::Validation(_, _))));
    }

    #[test]
    fn faces_gather_their_vertices() {
        let device = Default::default();
        let (vertices, faces) = quad::<NdArray>(&device);
        let mesh = Mesh::new(vertices, faces).unwrap();

        let faces_vertices = mesh.faces_vertices().unwrap();

        assert_eq!(faces_vertices.dims(), [2, 3, 3]);
        assert_eq!(
            faces_vertices.into_values(),
            [
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ]
        );
    }

    #[test]
    fn batches_gather_their_own_vertices() {
        let device = Default::default();
        let vertices = Tensor::<NdArray, 3>::from_values(
            (0..12).map(|i| i as f64).collect(),
            [2, 3, 2],
            &device,
        );
        let faces = Tensor::from_ints([[[2, 1, 0]], [[0, 0, 1]]], &device);

        let faces_vertices = vertices_to_faces(vertices, faces).unwrap();

        assert_eq!(faces_vertices.dims(), [2, 1, 3, 2]);
        assert_eq!(
            faces_vertices.into_values(),
            [4.0, 5.0, 2.0, 3.0, 0.0, 1.0, 6.0, 7.0, 6.0, 7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn gradients_accumulate_on_shared_vertices() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let (vertices, faces) = quad::<B>(&device);
        let vertices = vertices.require_grad();

        let grads = vertices_to_faces(vertices.to_owned().unsqueeze(), faces.unsqueeze())
            .unwrap()
            .sum()
            .backward();

        let vertices_grad = vertices.grad(&grads).unwrap().into_values();
        assert_eq!(
            vertices_grad,
            [2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0]
        );
    }
}
