pub use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arguments {
    /// `B`
    pub batch_size: u32,
    /// `ε`, added to the depth before the perspective division.
    pub epsilon: f64,
    /// `N`
    pub vertex_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct Inputs<'a> {
    /// `[B, 5]` as `(k1, k2, p1, p2, k3)`
    pub distortion: &'a [f64],
    /// `[B, 3, 3]`
    pub intrinsics: &'a [f64],
    /// `[B, 3, 3]`
    pub rotation: &'a [f64],
    /// `[B, 3]`
    pub translation: &'a [f64],
    /// `[B, N, 3]`
    pub vertices: &'a [f64],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[B, N, 3]` as `(u, v, depth)`
    pub screen_vertices: Vec<f64>,
}

/// Parameters of one camera in the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Camera {
    pub distortion: [f64; 5],
    pub intrinsics: [[f64; 3]; 3],
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

/// Intermediate values of projecting one vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Projection {
    /// `(x', y', z')`
    pub position_view: [f64; 3],
    /// `1 / (z' + ε)`
    pub depth_inverse: f64,
    /// `(x_, y_)`
    pub position_normalized: [f64; 2],
    /// `r² = x_² + y_²`
    pub radius_squared: f64,
    /// `1 + k1·r² + k2·r⁴ + k3·r⁶`
    pub radial: f64,
    /// `(x'', y'')`
    pub position_distorted: [f64; 2],
    /// `(u, v)` in pixels
    pub position_pixel: [f64; 2],
}

/// `(w / 2, h / 2)` taken from the principal point of the first camera.
///
/// Every camera in the batch is normalized with this reference.
#[inline]
pub fn reference_size_half(intrinsics: &[f64]) -> [f64; 2] {
    [intrinsics[2], intrinsics[5]]
}

impl Camera {
    pub fn from_inputs(
        inputs: &Inputs,
        batch_index: usize,
    ) -> Self {
        let matrix = |values: &[f64]| {
            let m = &values[batch_index * 9..batch_index * 9 + 9];
            [[m[0], m[1], m[2]], [m[3], m[4], m[5]], [m[6], m[7], m[8]]]
        };
        let d = &inputs.distortion[batch_index * 5..batch_index * 5 + 5];
        let t = &inputs.translation[batch_index * 3..batch_index * 3 + 3];

        Self {
            distortion: [d[0], d[1], d[2], d[3], d[4]],
            intrinsics: matrix(inputs.intrinsics),
            rotation: matrix(inputs.rotation),
            translation: [t[0], t[1], t[2]],
        }
    }

    pub fn project(
        &self,
        vertex: [f64; 3],
        epsilon: f64,
    ) -> Projection {
        let r = &self.rotation;
        let t = &self.translation;
        let k = &self.intrinsics;
        let [k1, k2, p1, p2, k3] = self.distortion;

        // p' = p * R^T + t
        let position_view = [0, 1, 2].map(|i| {
            r[i][0] * vertex[0] + r[i][1] * vertex[1] + r[i][2] * vertex[2]
                + t[i]
        });
        let depth_inverse = 1.0 / (position_view[2] + epsilon);
        let x = position_view[0] * depth_inverse;
        let y = position_view[1] * depth_inverse;

        let radius_squared = x * x + y * y;
        let r2 = radius_squared;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let x_distorted =
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_distorted =
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        // [u, v, _] = [x'', y'', 1] * K^T
        let position_pixel = [0, 1].map(|i| {
            k[i][0] * x_distorted + k[i][1] * y_distorted + k[i][2]
        });

        Projection {
            position_view,
            depth_inverse,
            position_normalized: [x, y],
            radius_squared,
            radial,
            position_distorted: [x_distorted, y_distorted],
            position_pixel,
        }
    }
}

/// Projecting the vertices from world space to the normalized screen space.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // B
    let batch_size = arguments.batch_size as usize;
    // N
    let vertex_count = arguments.vertex_count as usize;
    let [size_half_x, size_half_y] = reference_size_half(inputs.intrinsics);
    // w
    let size_x = size_half_x * 2.0;
    // h
    let size_y = size_half_y * 2.0;

    debug_assert_eq!(inputs.vertices.len(), batch_size * vertex_count * 3);

    let cameras = (0..batch_size)
        .map(|batch_index| Camera::from_inputs(&inputs, batch_index))
        .collect::<Vec<_>>();

    let mut screen_vertices = vec![0.0; batch_size * vertex_count * 3];
    screen_vertices
        .par_chunks_mut(3)
        .enumerate()
        .for_each(|(index, screen_vertex)| {
            let camera = &cameras[index / vertex_count.max(1)];
            let vertex = &inputs.vertices[index * 3..index * 3 + 3];
            let projection =
                camera.project([vertex[0], vertex[1], vertex[2]], arguments.epsilon);
            let [u, v] = projection.position_pixel;

            screen_vertex[0] = 2.0 * (u - size_x / 2.0) / size_x;
            screen_vertex[1] = 2.0 * (v - size_y / 2.0) / size_y;
            screen_vertex[2] = projection.position_view[2];
        });

    Outputs { screen_vertices }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_inputs() -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let distortion = vec![0.0; 5];
        let intrinsics =
            vec![250.0, 0.0, 128.0, 0.0, 250.0, 128.0, 0.0, 0.0, 1.0];
        let rotation = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let translation = vec![0.0, 0.0, 5.0];
        (distortion, intrinsics, rotation, translation)
    }

    #[test]
    fn pinhole_without_distortion() {
        let (distortion, intrinsics, rotation, translation) = camera_inputs();
        let vertices = vec![0.5, -0.25, 1.0, -1.0, 2.0, -2.0];

        let outputs = main(
            Arguments {
                batch_size: 1,
                epsilon: 0.0,
                vertex_count: 2,
            },
            Inputs {
                distortion: &distortion,
                intrinsics: &intrinsics,
                rotation: &rotation,
                translation: &translation,
                vertices: &vertices,
            },
        );

        vertices.chunks(3).zip(outputs.screen_vertices.chunks(3)).for_each(
            |(vertex, screen)| {
                let z = vertex[2] + 5.0;
                let u = 250.0 * vertex[0] / z + 128.0;
                let v = 250.0 * vertex[1] / z + 128.0;
                assert!((screen[0] - (u - 128.0) / 128.0).abs() < 1e-12);
                assert!((screen[1] - (v - 128.0) / 128.0).abs() < 1e-12);
                assert_eq!(screen[2], z);
            },
        );
    }

    #[test]
    fn distortion_moves_off_axis_points_only() {
        let (_, intrinsics, rotation, translation) = camera_inputs();
        let distortion = vec![0.1, 0.01, 0.001, 0.002, 0.0001];
        let vertices = vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let arguments = Arguments {
            batch_size: 1,
            epsilon: 1e-9,
            vertex_count: 2,
        };

        let outputs = main(
            arguments,
            Inputs {
                distortion: &distortion,
                intrinsics: &intrinsics,
                rotation: &rotation,
                translation: &translation,
                vertices: &vertices,
            },
        );

        assert!(outputs.screen_vertices[0].abs() < 1e-12);
        assert!(outputs.screen_vertices[1].abs() < 1e-12);
        // x_ = y_ = 0.2, r² = 0.08
        let x = 0.2;
        let r2 = 0.08;
        let radial = 1.0 + 0.1 * r2 + 0.01 * r2 * r2 + 0.0001 * r2 * r2 * r2;
        let x_distorted =
            x * radial + 2.0 * 0.001 * x * x + 0.002 * (r2 + 2.0 * x * x);
        let u = (250.0 * x_distorted + 128.0 - 128.0) / 128.0;
        assert!((outputs.screen_vertices[3] - u).abs() < 1e-9);
    }

    #[test]
    fn near_zero_depth_stays_finite() {
        let (distortion, intrinsics, rotation, _) = camera_inputs();
        let translation = vec![0.0; 3];
        let vertices = vec![0.3, 0.2, 0.0, 0.3, 0.2, 1e-12];

        let outputs = main(
            Arguments {
                batch_size: 1,
                epsilon: 1e-9,
                vertex_count: 2,
            },
            Inputs {
                distortion: &distortion,
                intrinsics: &intrinsics,
                rotation: &rotation,
                translation: &translation,
                vertices: &vertices,
            },
        );

        assert!(outputs.screen_vertices.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn random_vertices_in_front_stay_finite() {
        use rand::{rngs::StdRng, SeedableRng};
        use rand_distr::{Distribution, Normal};

        let (_, intrinsics, rotation, translation) = camera_inputs();
        let distortion = vec![-0.2, 0.05, 0.001, -0.001, 0.0];
        let normal = Normal::new(0.0, 1.0).unwrap();
        let vertices = normal
            .sample_iter(StdRng::seed_from_u64(0))
            .take(1024 * 3)
            .collect::<Vec<f64>>();

        let outputs = main(
            Arguments {
                batch_size: 1,
                epsilon: 1e-9,
                vertex_count: 1024,
            },
            Inputs {
                distortion: &distortion,
                intrinsics: &intrinsics,
                rotation: &rotation,
                translation: &translation,
                vertices: &vertices,
            },
        );

        assert!(outputs.screen_vertices.iter().all(|v| v.is_finite()));
        assert!(outputs
            .screen_vertices
            .chunks_exact(3)
            .all(|vertex| vertex[2] > 0.0));
    }
}
