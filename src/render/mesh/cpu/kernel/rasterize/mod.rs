//! Soft rasterization of screen-space triangles.
//!
//! Every pixel gathers the triangles whose expanded bounding box contains
//! its center, turns them into [`Fragment`]s and composites them.

pub use super::composite::{self, Layer, Pixel};
pub use super::texture::{self, Filter};
pub use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arguments {
    /// `B`
    pub batch_size: u32,
    /// `C`
    pub channel_count: u32,
    /// `θ`
    pub coverage_threshold: f64,
    pub depth_far: f64,
    pub depth_near: f64,
    /// `γ`
    pub depth_softness: f64,
    /// `F`
    pub face_count: u32,
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `σ`, in inverse pixels
    pub sharpness: f64,
    pub texture_filter: Filter,
    /// `T`
    pub texture_size: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct Inputs<'a> {
    /// `[C]`
    pub background: &'a [f64],
    /// `[B, F, 3, 3]` as `(u, v, depth)` per vertex
    pub faces: &'a [f64],
    /// `[B, F, T³, C]`
    pub textures: &'a [f64],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[B, I_y, I_x]`
    pub depth_maxima: Vec<f64>,
    /// `[B, I_y, I_x, C + 2]` as `(color, depth, silhouette)`
    pub images: Vec<f64>,
    /// `[B, I_y, I_x]`
    pub normalizers: Vec<f64>,
}

/// `L`, the bound of the logit of coverage.
pub const COVERAGE_LOGIT_MAX: f64 = 30.0;
/// Triangles with a smaller absolute doubled area in pixels are skipped.
pub const AREA_MIN: f64 = 1e-10;

/// A face set up in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    /// Doubled signed area, `(b - a) × (c - a)`
    pub area: f64,
    /// `[x_min, x_max, y_min, y_max]`, expanded by the coverage margin
    pub bounds: [f64; 4],
    pub depths: [f64; 3],
    pub face_index: usize,
    pub positions: [[f64; 2]; 3],
}

/// The nearest edge segment to a pixel center.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Edge {
    /// `p - closest`
    pub difference: [f64; 2],
    pub distance: f64,
    /// Index of the first end, the second end is the next vertex
    pub start: usize,
    /// Position of the closest point along the segment, in `[0, 1]`
    pub t: f64,
}

/// A (pixel, triangle) pair that covers the pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fragment {
    pub barycentric: [f64; 3],
    /// `w̃`, clamped to `[0, 1]` and normalized
    pub barycentric_clipped: [f64; 3],
    /// `Σ clamp(w, 0, 1)`
    pub barycentric_clipped_sum: f64,
    /// `D`
    pub coverage: f64,
    pub depth: f64,
    pub edge: Edge,
    /// `σ · sd`, before clamping
    pub logit: f64,
    pub triangle_index: usize,
}

/// `(b, c)`, `(c, a)` and `(a, b)`, opposite to each vertex.
pub const OPPOSITE_EDGES: [[usize; 2]; 3] = [[1, 2], [2, 0], [0, 1]];

#[inline]
pub fn cross(
    p: [f64; 2],
    q: [f64; 2],
) -> f64 {
    p[0] * q[1] - p[1] * q[0]
}

impl Arguments {
    /// `ln((1 - θ) / θ) / σ`, the distance in pixels beyond which the
    /// coverage falls below the threshold.
    pub fn coverage_margin(&self) -> f64 {
        let threshold = self.coverage_threshold;
        ((1.0 - threshold) / threshold).ln().max(0.0) / self.sharpness
    }

    pub fn composite(&self) -> composite::Arguments {
        composite::Arguments {
            depth_far: self.depth_far,
            depth_near: self.depth_near,
            depth_softness: self.depth_softness,
        }
    }
}

impl Triangle {
    /// Setting up the face of the given index.
    ///
    /// Returns `None` if the triangle is degenerate or every vertex is behind
    /// the camera. The fragments of a partly visible triangle are clipped by
    /// their interpolated depth.
    pub fn new(
        arguments: &Arguments,
        face: &[f64],
        face_index: usize,
    ) -> Option<Self> {
        let size_x = arguments.image_size_x as f64;
        let size_y = arguments.image_size_y as f64;
        let margin = arguments.coverage_margin();

        let positions = [0, 1, 2].map(|i| {
            [(face[i * 3] + 1.0) * size_x / 2.0, (face[i * 3 + 1] + 1.0) * size_y / 2.0]
        });
        let depths = [0, 1, 2].map(|i| face[i * 3 + 2]);
        let [a, b, c] = positions;
        let area = cross([b[0] - a[0], b[1] - a[1]], [c[0] - a[0], c[1] - a[1]]);

        let is_valid = area.abs() >= AREA_MIN
            && area.is_finite()
            && depths.iter().all(|depth| depth.is_finite())
            && depths.iter().any(|&depth| depth > 0.0)
            && positions.iter().flatten().all(|p| p.is_finite());
        if !is_valid {
            return None;
        }

        let bounds = [
            a[0].min(b[0]).min(c[0]) - margin,
            a[0].max(b[0]).max(c[0]) + margin,
            a[1].min(b[1]).min(c[1]) - margin,
            a[1].max(b[1]).max(c[1]) + margin,
        ];

        Some(Self {
            area,
            bounds,
            depths,
            face_index,
            positions,
        })
    }

    #[inline]
    pub fn contains_bounds(
        &self,
        point: [f64; 2],
    ) -> bool {
        let [x_min, x_max, y_min, y_max] = self.bounds;
        point[0] >= x_min && point[0] <= x_max && point[1] >= y_min && point[1] <= y_max
    }

    /// `w_i = ((P_i - p) × (Q_i - p)) / A`
    pub fn barycentric(
        &self,
        point: [f64; 2],
    ) -> [f64; 3] {
        OPPOSITE_EDGES.map(|[p, q]| {
            let p = self.positions[p];
            let q = self.positions[q];
            cross(
                [p[0] - point[0], p[1] - point[1]],
                [q[0] - point[0], q[1] - point[1]],
            ) / self.area
        })
    }

    /// Finding the nearest point on the boundary.
    pub fn nearest_edge(
        &self,
        point: [f64; 2],
    ) -> Edge {
        (0..3)
            .map(|start| {
                let a = self.positions[start];
                let b = self.positions[(start + 1) % 3];
                let direction = [b[0] - a[0], b[1] - a[1]];
                let length_squared =
                    direction[0] * direction[0] + direction[1] * direction[1];
                let t = if length_squared > 0.0 {
                    (((point[0] - a[0]) * direction[0]
                        + (point[1] - a[1]) * direction[1])
                        / length_squared)
                        .clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let difference = [
                    point[0] - (a[0] + t * direction[0]),
                    point[1] - (a[1] + t * direction[1]),
                ];
                Edge {
                    difference,
                    distance: difference[0].hypot(difference[1]),
                    start,
                    t,
                }
            })
            .fold(
                Edge {
                    distance: f64::INFINITY,
                    ..Default::default()
                },
                |nearest, edge| {
                    if edge.distance < nearest.distance {
                        edge
                    } else {
                        nearest
                    }
                },
            )
    }

    /// Computing the fragment at a pixel center.
    ///
    /// Returns `None` if the coverage is below the threshold or the depth
    /// is out of the clipping range.
    pub fn fragment(
        &self,
        arguments: &Arguments,
        point: [f64; 2],
        triangle_index: usize,
    ) -> Option<Fragment> {
        let barycentric = self.barycentric(point);
        let is_inside = barycentric.iter().all(|&w| w >= 0.0);
        let edge = self.nearest_edge(point);
        let distance_signed = if is_inside {
            edge.distance
        } else {
            -edge.distance
        };
        let logit = arguments.sharpness * distance_signed;
        let coverage =
            sigmoid(logit.clamp(-COVERAGE_LOGIT_MAX, COVERAGE_LOGIT_MAX));
        if coverage < arguments.coverage_threshold {
            return None;
        }

        let clamped = barycentric.map(|w| w.clamp(0.0, 1.0));
        let barycentric_clipped_sum = clamped.iter().sum::<f64>();
        let barycentric_clipped = clamped.map(|w| w / barycentric_clipped_sum);

        // 1 / z = Σ w̃_i / z_i
        let depth_inverse = barycentric_clipped
            .iter()
            .zip(self.depths)
            .filter(|(w, _)| **w != 0.0)
            .map(|(w, z)| w / z)
            .sum::<f64>();
        // Fragments behind the camera have a non-positive inverse depth.
        if !(depth_inverse > 0.0 && depth_inverse.is_finite()) {
            return None;
        }
        let depth = depth_inverse.recip();
        if !(depth >= arguments.depth_near && depth <= arguments.depth_far) {
            return None;
        }

        Some(Fragment {
            barycentric,
            barycentric_clipped,
            barycentric_clipped_sum,
            coverage,
            depth,
            edge,
            logit,
            triangle_index,
        })
    }
}

/// The triangles of one batch element and the rows they may cover.
#[derive(Clone, Debug, Default)]
pub struct Bins {
    /// `[I_y]`, indices into `triangles`
    pub rows: Vec<Vec<usize>>,
    pub triangles: Vec<Triangle>,
}

impl Bins {
    /// Setting up the faces of one batch element.
    ///
    /// ## Arguments
    ///
    /// * `faces` - `[F, 3, 3]`
    pub fn new(
        arguments: &Arguments,
        faces: &[f64],
    ) -> Self {
        let size_y = arguments.image_size_y as usize;
        let triangles = faces
            .chunks_exact(9)
            .enumerate()
            .filter_map(|(face_index, face)| Triangle::new(arguments, face, face_index))
            .collect::<Vec<_>>();

        let mut rows = vec![Vec::new(); size_y];
        triangles.iter().enumerate().for_each(|(index, triangle)| {
            let [_, _, y_min, y_max] = triangle.bounds;
            // Pixel centers are at `y + 0.5`
            let row_first = (y_min - 0.5).ceil().max(0.0);
            let row_last = (y_max - 0.5).floor().min(size_y as f64 - 1.0);
            if row_first > row_last {
                return;
            }
            (row_first as usize..=row_last as usize)
                .for_each(|row| rows[row].push(index));
        });

        Self { rows, triangles }
    }

    /// Collecting the fragments covering the pixel at `(x, y)`.
    pub fn fragments(
        &self,
        arguments: &Arguments,
        x: usize,
        y: usize,
        fragments: &mut Vec<Fragment>,
    ) {
        let point = [x as f64 + 0.5, y as f64 + 0.5];
        fragments.clear();
        fragments.extend(self.rows[y].iter().filter_map(|&index| {
            let triangle = &self.triangles[index];
            if !triangle.contains_bounds(point) {
                return None;
            }
            triangle.fragment(arguments, point, index)
        }));
    }
}

/// Sampling the color of every fragment.
///
/// ## Arguments
///
/// * `textures` - `[F, T³, C]` of one batch element
/// * `colors` - overwritten with `[L, C]`
pub fn sample_colors(
    arguments: &Arguments,
    bins: &Bins,
    textures: &[f64],
    fragments: &[Fragment],
    colors: &mut Vec<f64>,
) {
    let channel_count = arguments.channel_count as usize;
    let texture_size = arguments.texture_size as usize;
    let texels_size = texture_size.pow(3) * channel_count;

    colors.clear();
    colors.resize(fragments.len() * channel_count, 0.0);
    fragments
        .iter()
        .zip(colors.chunks_exact_mut(channel_count.max(1)))
        .for_each(|(fragment, color)| {
            let face_index = bins.triangles[fragment.triangle_index].face_index;
            texture::sample(
                &textures[face_index * texels_size..][..texels_size],
                texture_size,
                arguments.texture_filter,
                fragment.barycentric_clipped,
                color,
            );
        });
}

/// Rasterizing the faces to the images.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
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
    // T³ * C
    let texels_size = (arguments.texture_size as usize).pow(3) * channel_count;
    let composite_arguments = arguments.composite();

    debug_assert_eq!(inputs.faces.len(), batch_size * face_count * 9);
    debug_assert_eq!(inputs.textures.len(), batch_size * face_count * texels_size);
    debug_assert_eq!(inputs.background.len(), channel_count);

    let bins = (0..batch_size)
        .into_par_iter()
        .map(|batch_index| {
            Bins::new(
                &arguments,
                &inputs.faces[batch_index * face_count * 9..][..face_count * 9],
            )
        })
        .collect::<Vec<_>>();

    let pixel_size = channel_count + 2;
    let mut images = vec![0.0; batch_size * size_y * size_x * pixel_size];
    let mut normalizers = vec![0.0; batch_size * size_y * size_x];
    let mut depth_maxima = vec![0.0; batch_size * size_y * size_x];

    images
        .par_chunks_mut((size_x * pixel_size).max(1))
        .zip(normalizers.par_chunks_mut(size_x.max(1)))
        .zip(depth_maxima.par_chunks_mut(size_x.max(1)))
        .enumerate()
        .for_each(|(row_index, ((image_row, normalizer_row), depth_max_row))| {
            let batch_index = row_index / size_y;
            let y = row_index % size_y;
            let bins = &bins[batch_index];
            let textures = &inputs.textures
                [batch_index * face_count * texels_size..][..face_count * texels_size];

            let mut fragments = Vec::new();
            let mut layers = Vec::new();
            let mut colors = Vec::new();

            (0..size_x).for_each(|x| {
                bins.fragments(&arguments, x, y, &mut fragments);
                sample_colors(&arguments, bins, textures, &fragments, &mut colors);
                layers.clear();
                layers.extend(fragments.iter().map(|fragment| Layer {
                    coverage: fragment.coverage,
                    depth: fragment.depth,
                }));

                let output = &mut image_row[x * pixel_size..][..pixel_size];
                let pixel = composite::forward(
                    &composite_arguments,
                    &layers,
                    &colors,
                    inputs.background,
                    &mut output[..channel_count],
                );
                output[channel_count] = pixel.depth;
                output[channel_count + 1] = pixel.silhouette;
                normalizer_row[x] = pixel.normalizer;
                depth_max_row[x] = pixel.depth_max;
            });
        });

    Outputs {
        depth_maxima,
        images,
        normalizers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments(
        image_size: u32,
        face_count: u32,
    ) -> Arguments {
        Arguments {
            batch_size: 1,
            channel_count: 1,
            coverage_threshold: 1e-4,
            depth_far: 100.0,
            depth_near: 0.1,
            depth_softness: 1e-4,
            face_count,
            image_size_x: image_size,
            image_size_y: image_size,
            sharpness: 1.0,
            texture_filter: Filter::Trilinear,
            texture_size: 1,
        }
    }

    fn silhouette_area(
        arguments: &Arguments,
        faces: &[f64],
    ) -> f64 {
        let outputs = main(
            *arguments,
            Inputs {
                background: &[0.0],
                faces,
                textures: &vec![1.0; arguments.face_count as usize],
            },
        );
        outputs.images.chunks_exact(3).map(|pixel| pixel[2]).sum()
    }

    #[test]
    fn silhouette_area_converges_to_triangle_area() {
        // Pixel-space vertices (8, 8), (56, 8), (8, 56) on a 64x64 image
        let faces = [
            -0.75, -0.75, 2.0, //
            0.75, -0.75, 2.0, //
            -0.75, 0.75, 2.0,
        ];
        let area = 48.0 * 48.0 / 2.0;

        let errors = [0.5, 2.0, 8.0].map(|sharpness| {
            let arguments = Arguments {
                sharpness,
                ..arguments(64, 1)
            };
            (silhouette_area(&arguments, &faces) - area).abs() / area
        });

        assert!(errors[0] > errors[1], "{errors:?}");
        assert!(errors[1] > errors[2], "{errors:?}");
        assert!(errors[2] < 0.02, "{errors:?}");
    }

    #[test]
    fn nearer_triangle_occludes() {
        let arguments = Arguments {
            sharpness: 4.0,
            texture_size: 1,
            ..arguments(16, 2)
        };
        let triangle = |depth: f64| {
            [
                -0.9, -0.9, depth, //
                0.9, -0.9, depth, //
                0.0, 0.9, depth,
            ]
        };
        let faces = [triangle(5.0), triangle(3.0)].concat();
        let textures = [0.25, 0.75];

        let outputs = main(
            arguments,
            Inputs {
                background: &[0.0],
                faces: &faces,
                textures: &textures,
            },
        );

        // The center pixel (8, 8)
        let pixel = &outputs.images[(8 * 16 + 8) * 3..][..3];
        assert!((pixel[0] - 0.75).abs() < 1e-6, "{pixel:?}");
        assert!((pixel[1] - 3.0).abs() < 1e-6, "{pixel:?}");
        assert!(pixel[2] > 0.999, "{pixel:?}");
    }

    #[test]
    fn culled_faces_leave_background() {
        let arguments = arguments(8, 3);
        let faces = [
            // Degenerate
            -0.5, -0.5, 2.0, 0.0, 0.0, 2.0, 0.5, 0.5, 2.0, //
            // Behind the camera
            -0.5, -0.5, -2.0, 0.5, -0.5, -2.0, 0.0, 0.5, -2.0, //
            // Beyond the far plane
            -0.5, -0.5, 200.0, 0.5, -0.5, 200.0, 0.0, 0.5, 200.0,
        ];

        let outputs = main(
            arguments,
            Inputs {
                background: &[0.5],
                faces: &faces,
                textures: &[1.0, 1.0, 1.0],
            },
        );

        outputs.images.chunks_exact(3).for_each(|pixel| {
            assert_eq!(pixel, [0.5, 100.0, 0.0]);
        });
        assert!(outputs.normalizers.iter().all(|&z| z == 1.0));
    }

    #[test]
    fn barycentric_sums_to_one_for_either_winding() {
        let arguments = arguments(32, 1);
        let face = [-0.5, -0.5, 1.0, 0.5, -0.5, 2.0, 0.0, 0.5, 3.0];
        let reversed = [0.0, 0.5, 3.0, 0.5, -0.5, 2.0, -0.5, -0.5, 1.0];

        [face, reversed].iter().for_each(|face| {
            let triangle = Triangle::new(&arguments, face, 0).unwrap();
            let barycentric = triangle.barycentric([13.0, 17.5]);
            assert!((barycentric.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(barycentric.iter().all(|&w| w > 0.0));
            let corner = triangle.barycentric(triangle.positions[1]);
            assert!((corner[1] - 1.0).abs() < 1e-12, "{corner:?}");
        });
    }

    #[test]
    fn partly_behind_triangle_keeps_front_fragments() {
        let arguments = Arguments {
            sharpness: 2.0,
            ..arguments(16, 1)
        };
        let triangle = |depth: f64| {
            [
                -0.9, -0.9, 2.0, //
                0.9, -0.9, 2.0, //
                -0.9, 0.9, depth,
            ]
        };

        let area_front = silhouette_area(&arguments, &triangle(0.5));
        let areas = [-0.01, 0.0].map(|depth| silhouette_area(&arguments, &triangle(depth)));

        areas.iter().for_each(|&area| {
            assert!(area.is_finite(), "{areas:?}");
            assert!(area > 0.0, "{areas:?}");
            assert!(area < area_front, "{areas:?} >= {area_front}");
        });

        let outputs = main(
            arguments,
            Inputs {
                background: &[0.0],
                faces: &triangle(-0.01),
                textures: &[1.0],
            },
        );
        outputs.images.chunks_exact(3).for_each(|pixel| {
            assert!(pixel.iter().all(|value| value.is_finite()), "{pixel:?}");
            assert!(pixel[1] >= arguments.depth_near, "{pixel:?}");
        });
    }
}
