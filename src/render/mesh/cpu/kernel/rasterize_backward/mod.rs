pub use super::rasterize::{
    composite::{self, LayerGrad},
    texture, Arguments, Bins, Fragment, Inputs, Layer, Pixel, Triangle,
    COVERAGE_LOGIT_MAX, OPPOSITE_EDGES,
};
pub use super::*;

use super::rasterize::sample_colors;

#[derive(Clone, Copy, Debug)]
pub struct ForwardOutputs<'a> {
    /// `[B, I_y, I_x]`
    pub depth_maxima: &'a [f64],
    /// `[B, I_y, I_x, C + 2]`
    pub images: &'a [f64],
    /// `[B, I_y, I_x]`
    pub normalizers: &'a [f64],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[B, F, 3, 3]`
    pub faces_grad: Vec<f64>,
    /// `[B, F, T³, C]`
    pub textures_grad: Vec<f64>,
}

/// Gradients of one fragment with respect to its triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TriangleGrad {
    pub depths: [f64; 3],
    /// In pixels
    pub positions: [[f64; 2]; 3],
}

impl TriangleGrad {
    /// Back-propagating through `w̃ = clamp(w, 0, 1) / Σ clamp(w, 0, 1)`
    /// and then through the edge functions.
    pub fn add_barycentric_clipped(
        &mut self,
        triangle: &Triangle,
        fragment: &Fragment,
        point: [f64; 2],
        barycentric_clipped_grad: [f64; 3],
    ) {
        let clipped = fragment.barycentric_clipped;
        let dot = (0..3)
            .map(|i| barycentric_clipped_grad[i] * clipped[i])
            .sum::<f64>();
        let barycentric_grad = [0, 1, 2].map(|i| {
            let w = fragment.barycentric[i];
            if w > 0.0 && w < 1.0 {
                (barycentric_clipped_grad[i] - dot) / fragment.barycentric_clipped_sum
            } else {
                0.0
            }
        });
        self.add_barycentric(triangle, fragment, point, barycentric_grad);
    }

    /// Back-propagating through `w_i = ((P_i - p) × (Q_i - p)) / A`.
    pub fn add_barycentric(
        &mut self,
        triangle: &Triangle,
        fragment: &Fragment,
        point: [f64; 2],
        barycentric_grad: [f64; 3],
    ) {
        let dot = (0..3)
            .map(|i| barycentric_grad[i] * fragment.barycentric[i])
            .sum::<f64>();

        OPPOSITE_EDGES.iter().enumerate().for_each(|(i, &[p, q])| {
            let grad = (barycentric_grad[i] - dot) / triangle.area;
            let p_position = triangle.positions[p];
            let q_position = triangle.positions[q];
            self.positions[p][0] += grad * (q_position[1] - point[1]);
            self.positions[p][1] -= grad * (q_position[0] - point[0]);
            self.positions[q][0] -= grad * (p_position[1] - point[1]);
            self.positions[q][1] += grad * (p_position[0] - point[0]);
        });
    }

    /// Back-propagating through `D = sigmoid(σ · sd)`.
    pub fn add_coverage(
        &mut self,
        arguments: &Arguments,
        fragment: &Fragment,
        coverage_grad: f64,
    ) {
        let edge = &fragment.edge;
        if fragment.logit.abs() >= COVERAGE_LOGIT_MAX || edge.distance <= 0.0 {
            return;
        }

        let coverage = fragment.coverage;
        let sign = fragment.logit.signum();
        // ∂L / ∂d
        let distance_grad =
            coverage_grad * coverage * (1.0 - coverage) * arguments.sharpness * sign;
        let direction = edge.difference.map(|d| d / edge.distance);
        let end = (edge.start + 1) % 3;

        (0..2).for_each(|axis| {
            self.positions[edge.start][axis] -=
                distance_grad * (1.0 - edge.t) * direction[axis];
            self.positions[end][axis] -= distance_grad * edge.t * direction[axis];
        });
    }

    /// Back-propagating through `z = 1 / Σ w̃_i / z_i`.
    ///
    /// Returns the gradient of the clipped barycentric coordinates.
    pub fn add_depth(
        &mut self,
        triangle: &Triangle,
        fragment: &Fragment,
        depth_grad: f64,
    ) -> [f64; 3] {
        let depth_squared = fragment.depth * fragment.depth;
        [0, 1, 2].map(|i| {
            let vertex_depth = triangle.depths[i];
            if vertex_depth == 0.0 {
                return 0.0;
            }
            self.depths[i] += depth_grad * depth_squared
                * fragment.barycentric_clipped[i]
                / (vertex_depth * vertex_depth);
            -depth_grad * depth_squared / vertex_depth
        })
    }
}

/// Computing the gradients of the faces and textures from the gradients
/// of the images.
///
/// ## Arguments
///
/// * `images_grad` - `[B, I_y, I_x, C + 2]`
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
    forward: ForwardOutputs,
    images_grad: &[f64],
) -> Outputs {
    // B
    let batch_size = arguments.batch_size as usize;
    // C
    let channel_count = arguments.channel_count as usize;
    // F
    let face_count = arguments.face_count as usize;
    // I_x
    let size_x = arguments.image_size_x as usize;
    // I_y
    let size_y = arguments.image_size_y as usize;
    // T
    let texture_size = arguments.texture_size as usize;
    // T³ * C
    let texels_size = texture_size.pow(3) * channel_count;
    let pixel_size = channel_count + 2;
    let composite_arguments = arguments.composite();

    debug_assert_eq!(images_grad.len(), forward.images.len());
    debug_assert_eq!(forward.images.len(), batch_size * size_y * size_x * pixel_size);

    let bins = (0..batch_size)
        .into_par_iter()
        .map(|batch_index| {
            Bins::new(
                &arguments,
                &inputs.faces[batch_index * face_count * 9..][..face_count * 9],
            )
        })
        .collect::<Vec<_>>();

    let (faces_grad, textures_grad) = (0..batch_size * size_y)
        .into_par_iter()
        .fold(
            || {
                (
                    GradientBuffer::zeros(batch_size * face_count * 9),
                    GradientBuffer::zeros(batch_size * face_count * texels_size),
                )
            },
            |(mut faces_grad, mut textures_grad), row_index| {
                let batch_index = row_index / size_y;
                let y = row_index % size_y;
                let bins = &bins[batch_index];
                let face_offset = batch_index * face_count;
                let textures = &inputs.textures
                    [face_offset * texels_size..][..face_count * texels_size];

                let mut fragments = Vec::new();
                let mut layers = Vec::new();
                let mut colors = Vec::new();
                let mut layer_grads = Vec::new();
                let mut colors_grad = Vec::new();

                for x in 0..size_x {
                    let pixel_index = row_index * size_x + x;
                    let pixel_grad = &images_grad[pixel_index * pixel_size..][..pixel_size];
                    if pixel_grad.iter().all(|&grad| grad == 0.0) {
                        continue;
                    }

                    bins.fragments(&arguments, x, y, &mut fragments);
                    if fragments.is_empty() {
                        continue;
                    }
                    sample_colors(&arguments, bins, textures, &fragments, &mut colors);
                    layers.clear();
                    layers.extend(fragments.iter().map(|fragment| Layer {
                        coverage: fragment.coverage,
                        depth: fragment.depth,
                    }));

                    let output = &forward.images[pixel_index * pixel_size..][..pixel_size];
                    let pixel = Pixel {
                        depth: output[channel_count],
                        depth_max: forward.depth_maxima[pixel_index],
                        normalizer: forward.normalizers[pixel_index],
                        silhouette: output[channel_count + 1],
                    };
                    layer_grads.clear();
                    layer_grads.resize(fragments.len(), LayerGrad::default());
                    colors_grad.clear();
                    colors_grad.resize(colors.len(), 0.0);
                    composite::backward(
                        &composite_arguments,
                        &layers,
                        &colors,
                        &pixel,
                        &output[..channel_count],
                        &pixel_grad[..channel_count],
                        pixel_grad[channel_count],
                        pixel_grad[channel_count + 1],
                        &mut layer_grads,
                        &mut colors_grad,
                    );

                    let point = [x as f64 + 0.5, y as f64 + 0.5];
                    fragments
                        .iter()
                        .zip(&layer_grads)
                        .zip(colors_grad.chunks_exact(channel_count.max(1)))
                        .for_each(|((fragment, layer_grad), color_grad)| {
                            let triangle = &bins.triangles[fragment.triangle_index];
                            let face_index = face_offset + triangle.face_index;
                            let texels_range = face_index * texels_size
                                ..(face_index + 1) * texels_size;
                            let mut grad = TriangleGrad::default();

                            let mut barycentric_clipped_grad = texture::sample_backward(
                                &inputs.textures[texels_range.clone()],
                                texture_size,
                                arguments.texture_filter,
                                fragment.barycentric_clipped,
                                color_grad,
                                &mut textures_grad.as_mut_slice()[texels_range],
                            );
                            grad.add_depth(triangle, fragment, layer_grad.depth)
                                .iter()
                                .enumerate()
                                .for_each(|(i, g)| barycentric_clipped_grad[i] += g);
                            grad.add_barycentric_clipped(
                                triangle,
                                fragment,
                                point,
                                barycentric_clipped_grad,
                            );
                            grad.add_coverage(&arguments, fragment, layer_grad.coverage);

                            // Pixel to normalized screen space
                            let scales = [size_x as f64 / 2.0, size_y as f64 / 2.0];
                            (0..3).for_each(|vertex| {
                                let offset = face_index * 9 + vertex * 3;
                                faces_grad.add(offset, grad.positions[vertex][0] * scales[0]);
                                faces_grad.add(offset + 1, grad.positions[vertex][1] * scales[1]);
                                faces_grad.add(offset + 2, grad.depths[vertex]);
                            });
                        });
                }

                (faces_grad, textures_grad)
            },
        )
        .reduce(
            || {
                (
                    GradientBuffer::zeros(batch_size * face_count * 9),
                    GradientBuffer::zeros(batch_size * face_count * texels_size),
                )
            },
            |(faces_a, textures_a), (faces_b, textures_b)| {
                (faces_a.merge(faces_b), textures_a.merge(textures_b))
            },
        );

    Outputs {
        faces_grad: faces_grad.into_inner(),
        textures_grad: textures_grad.into_inner(),
    }
}
