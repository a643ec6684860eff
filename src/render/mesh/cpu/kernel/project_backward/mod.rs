pub use super::project::{Arguments, Camera, Inputs};
pub use super::*;

use super::project::reference_size_half;

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[B, 5]`
    pub distortion_grad: Vec<f64>,
    /// `[B, 3, 3]`
    pub intrinsics_grad: Vec<f64>,
    /// `[B, 3, 3]`
    pub rotation_grad: Vec<f64>,
    /// `[B, 3]`
    pub translation_grad: Vec<f64>,
    /// `[B, N, 3]`
    pub vertices_grad: Vec<f64>,
}

/// Per-camera gradient layout: `5 + 9 + 9 + 3`.
const CAMERA_GRAD_SIZE: usize = 26;
const OFFSET_DISTORTION: usize = 0;
const OFFSET_INTRINSICS: usize = 5;
const OFFSET_ROTATION: usize = 14;
const OFFSET_TRANSLATION: usize = 23;

/// Propagating the gradients of the screen vertices back to the vertices
/// and the camera parameters.
///
/// ## Arguments
///
/// * `screen_vertices_grad` - `[B, N, 3]`
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
    screen_vertices_grad: &[f64],
) -> Outputs {
    // B
    let batch_size = arguments.batch_size as usize;
    // N
    let vertex_count = arguments.vertex_count as usize;
    let [size_half_x, size_half_y] = reference_size_half(inputs.intrinsics);

    debug_assert_eq!(screen_vertices_grad.len(), batch_size * vertex_count * 3);

    let cameras = (0..batch_size)
        .map(|batch_index| Camera::from_inputs(&inputs, batch_index))
        .collect::<Vec<_>>();

    let mut vertices_grad = vec![0.0; batch_size * vertex_count * 3];
    let camera_grads = vertices_grad
        .par_chunks_mut(3)
        .enumerate()
        .fold(
            || GradientBuffer::zeros(batch_size * CAMERA_GRAD_SIZE),
            |mut camera_grads, (index, vertex_grad)| {
                let batch_index = index / vertex_count.max(1);
                let camera = &cameras[batch_index];
                let vertex = &inputs.vertices[index * 3..index * 3 + 3];
                let vertex = [vertex[0], vertex[1], vertex[2]];
                let grad = &screen_vertices_grad[index * 3..index * 3 + 3];
                let projection = camera.project(vertex, arguments.epsilon);

                // u = u_p / (w / 2) - 1
                let u_grad = grad[0] / size_half_x;
                let v_grad = grad[1] / size_half_y;
                let [u, v] = projection.position_pixel;
                // The reference principal point belongs to the first camera.
                camera_grads.add(
                    OFFSET_INTRINSICS + 2,
                    -grad[0] * u / (size_half_x * size_half_x),
                );
                camera_grads.add(
                    OFFSET_INTRINSICS + 5,
                    -grad[1] * v / (size_half_y * size_half_y),
                );

                let offset = batch_index * CAMERA_GRAD_SIZE;
                let k = &camera.intrinsics;
                let [x_d, y_d] = projection.position_distorted;
                [[u_grad * x_d, u_grad * y_d, u_grad], [
                    v_grad * x_d,
                    v_grad * y_d,
                    v_grad,
                ]]
                .iter()
                .flatten()
                .enumerate()
                .for_each(|(i, value)| {
                    camera_grads.add(offset + OFFSET_INTRINSICS + i, *value)
                });

                let x_d_grad = u_grad * k[0][0] + v_grad * k[1][0];
                let y_d_grad = u_grad * k[0][1] + v_grad * k[1][1];

                // Brown-Conrady
                let [k1, k2, p1, p2, k3] = camera.distortion;
                let [x, y] = projection.position_normalized;
                let r2 = projection.radius_squared;
                let radial = projection.radial;
                let radial_grad_r2 = k1 + 2.0 * k2 * r2 + 3.0 * k3 * r2 * r2;
                let mix = x_d_grad * x + y_d_grad * y;

                [
                    mix * r2,
                    mix * r2 * r2,
                    x_d_grad * 2.0 * x * y + y_d_grad * (r2 + 2.0 * y * y),
                    x_d_grad * (r2 + 2.0 * x * x) + y_d_grad * 2.0 * x * y,
                    mix * r2 * r2 * r2,
                ]
                .into_iter()
                .enumerate()
                .for_each(|(i, value)| {
                    camera_grads.add(offset + OFFSET_DISTORTION + i, value)
                });

                let xy_cross =
                    2.0 * x * y * radial_grad_r2 + 2.0 * p1 * x + 2.0 * p2 * y;
                let x_grad = x_d_grad
                    * (radial
                        + 2.0 * x * x * radial_grad_r2
                        + 2.0 * p1 * y
                        + 6.0 * p2 * x)
                    + y_d_grad * xy_cross;
                let y_grad = x_d_grad * xy_cross
                    + y_d_grad
                        * (radial
                            + 2.0 * y * y * radial_grad_r2
                            + 6.0 * p1 * y
                            + 2.0 * p2 * x);

                // x_ = x' / (z' + ε)
                let z_inverse = projection.depth_inverse;
                let view_grad = [
                    x_grad * z_inverse,
                    y_grad * z_inverse,
                    grad[2] - (x_grad * x + y_grad * y) * z_inverse,
                ];

                // p' = p * R^T + t
                let r = &camera.rotation;
                (0..3).for_each(|i| {
                    camera_grads
                        .add(offset + OFFSET_TRANSLATION + i, view_grad[i]);
                    (0..3).for_each(|j| {
                        camera_grads.add(
                            offset + OFFSET_ROTATION + i * 3 + j,
                            view_grad[i] * vertex[j],
                        );
                    });
                });
                (0..3).for_each(|j| {
                    vertex_grad[j] = (0..3).map(|i| view_grad[i] * r[i][j]).sum();
                });

                camera_grads
            },
        )
        .reduce(
            || GradientBuffer::zeros(batch_size * CAMERA_GRAD_SIZE),
            GradientBuffer::merge,
        )
        .into_inner();

    let split = |offset: usize, size: usize| {
        camera_grads
            .chunks(CAMERA_GRAD_SIZE)
            .flat_map(|grads| grads[offset..offset + size].iter().copied())
            .collect::<Vec<_>>()
    };

    Outputs {
        distortion_grad: split(OFFSET_DISTORTION, 5),
        intrinsics_grad: split(OFFSET_INTRINSICS, 9),
        rotation_grad: split(OFFSET_ROTATION, 9),
        translation_grad: split(OFFSET_TRANSLATION, 3),
        vertices_grad,
    }
}
