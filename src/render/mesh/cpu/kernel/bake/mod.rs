//! Baking per-face texture grids from an image and a UV layout.

pub use super::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageFilter {
    #[default]
    Bilinear,
    Nearest,
}

/// Mapping of the UV coordinates outside `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Wrapping {
    ClampToEdge,
    #[default]
    Repeat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arguments {
    /// `C`
    pub channel_count: u32,
    /// `F`
    pub face_count: u32,
    pub filter: ImageFilter,
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `T`
    pub texture_size: u32,
    pub wrapping: Wrapping,
}

#[derive(Clone, Copy, Debug)]
pub struct Inputs<'a> {
    /// `[I_y, I_x, C]`
    pub image: &'a [f64],
    /// `[F, 3, 2]`
    pub uv_layout: &'a [f64],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[F, T³, C]`
    pub textures: Vec<f64>,
}

impl Wrapping {
    #[inline]
    pub fn apply(
        self,
        coordinate: f64,
    ) -> f64 {
        if !coordinate.is_finite() {
            return 0.0;
        }
        match self {
            Self::ClampToEdge => coordinate.clamp(0.0, 1.0),
            Self::Repeat if (0.0..=1.0).contains(&coordinate) => coordinate,
            Self::Repeat => coordinate.rem_euclid(1.0),
        }
    }
}

/// Barycentric weights of the texel `(i, j, k)`.
///
/// The weights are normalized to sum to one, and the centroid is used
/// when all of them are zero.
pub fn texel_weights(
    texture_size: usize,
    index: usize,
) -> [f64; 3] {
    let size = texture_size.max(1);
    let i = index / (size * size);
    let j = index / size % size;
    let k = index % size;
    let sum = (i + j + k) as f64;
    if sum == 0.0 {
        return [1.0 / 3.0; 3];
    }
    [i, j, k].map(|n| n as f64 / sum)
}

/// The image pixels to read for a texel, with their weights.
///
/// Returns the number of valid taps.
pub fn taps(
    arguments: &Arguments,
    uv: [f64; 2],
    taps: &mut [(usize, f64); 4],
) -> usize {
    let size_x = arguments.image_size_x.max(1) as usize;
    let size_y = arguments.image_size_y.max(1) as usize;
    let u = arguments.wrapping.apply(uv[0]);
    let v = arguments.wrapping.apply(uv[1]);
    let x = u * (size_x - 1) as f64;
    let y = (1.0 - v) * (size_y - 1) as f64;

    match arguments.filter {
        ImageFilter::Nearest => {
            let x = (x.round() as usize).min(size_x - 1);
            let y = (y.round() as usize).min(size_y - 1);
            taps[0] = (y * size_x + x, 1.0);
            1
        },
        ImageFilter::Bilinear => {
            let x0 = (x.floor() as usize).min(size_x - 1);
            let y0 = (y.floor() as usize).min(size_y - 1);
            let x1 = (x0 + 1).min(size_x - 1);
            let y1 = (y0 + 1).min(size_y - 1);
            let fx = x - x0 as f64;
            let fy = y - y0 as f64;
            taps[0] = (y0 * size_x + x0, (1.0 - fx) * (1.0 - fy));
            taps[1] = (y0 * size_x + x1, fx * (1.0 - fy));
            taps[2] = (y1 * size_x + x0, (1.0 - fx) * fy);
            taps[3] = (y1 * size_x + x1, fx * fy);
            4
        },
    }
}

/// The UV coordinates of the texel of the given index on a face.
///
/// ## Arguments
///
/// * `uvs` - `[3, 2]`
pub fn texel_uv(
    texture_size: usize,
    index: usize,
    uvs: &[f64],
) -> [f64; 2] {
    let weights = texel_weights(texture_size, index);
    [0, 1].map(|axis| (0..3).map(|m| weights[m] * uvs[m * 2 + axis]).sum())
}

/// Baking the image to the texture grids.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // C
    let channel_count = arguments.channel_count as usize;
    // F
    let face_count = arguments.face_count as usize;
    // T
    let texture_size = arguments.texture_size as usize;
    // T³
    let texel_count = texture_size.pow(3);

    debug_assert_eq!(inputs.uv_layout.len(), face_count * 6);
    debug_assert_eq!(
        inputs.image.len(),
        (arguments.image_size_x * arguments.image_size_y) as usize * channel_count
    );

    let mut textures = vec![0.0; face_count * texel_count * channel_count];
    textures
        .par_chunks_mut((texel_count * channel_count).max(1))
        .enumerate()
        .for_each(|(face_index, texels)| {
            let uvs = &inputs.uv_layout[face_index * 6..][..6];
            let mut buffer = [(0, 0.0); 4];
            texels
                .chunks_exact_mut(channel_count.max(1))
                .enumerate()
                .for_each(|(index, texel)| {
                    let uv = texel_uv(texture_size, index, uvs);
                    let count = taps(&arguments, uv, &mut buffer);
                    buffer[..count].iter().for_each(|&(pixel, weight)| {
                        let color = &inputs.image[pixel * channel_count..][..channel_count];
                        texel
                            .iter_mut()
                            .zip(color)
                            .for_each(|(t, c)| *t += weight * c);
                    });
                });
        });

    Outputs { textures }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments(
        face_count: u32,
        texture_size: u32,
    ) -> Arguments {
        Arguments {
            channel_count: 3,
            face_count,
            filter: ImageFilter::Bilinear,
            image_size_x: 4,
            image_size_y: 3,
            texture_size,
            wrapping: Wrapping::Repeat,
        }
    }

    #[test]
    fn constant_image_bakes_constant_texture() {
        let image = [0.2, 0.4, 0.6].repeat(12);
        let uv_layout = [0.0, 0.0, 1.0, 0.0, 0.3, 1.7, -0.4, 0.2, 0.5, 0.5, 2.5, -1.0];

        let outputs = main(
            arguments(2, 3),
            Inputs {
                image: &image,
                uv_layout: &uv_layout,
            },
        );

        assert_eq!(outputs.textures.len(), 2 * 27 * 3);
        outputs.textures.chunks_exact(3).for_each(|texel| {
            assert!((texel[0] - 0.2).abs() < 1e-12, "{texel:?}");
            assert!((texel[1] - 0.4).abs() < 1e-12, "{texel:?}");
            assert!((texel[2] - 0.6).abs() < 1e-12, "{texel:?}");
        });
    }

    #[test]
    fn collapsed_uvs_bake_one_color() {
        let image = (0..36).map(|i| i as f64).collect::<Vec<_>>();
        let uv_layout = [0.25, 0.75].repeat(3);

        let outputs = main(
            arguments(1, 4),
            Inputs {
                image: &image,
                uv_layout: &uv_layout,
            },
        );

        let first = &outputs.textures[..3];
        outputs.textures.chunks_exact(3).for_each(|texel| {
            texel.iter().zip(first).for_each(|(value, first)| {
                assert!((value - first).abs() < 1e-9, "{texel:?}");
            });
        });
    }

    #[test]
    fn corners_read_image_corners() {
        let image = (0..36).map(|i| i as f64).collect::<Vec<_>>();
        // (0, 1) is the top-left pixel and (1, 0) is the bottom-right pixel
        let uv_layout = [0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let mut arguments = arguments(1, 2);

        for filter in [ImageFilter::Bilinear, ImageFilter::Nearest] {
            arguments.filter = filter;
            let outputs = main(
                arguments,
                Inputs {
                    image: &image,
                    uv_layout: &uv_layout,
                },
            );
            // Texel (1, 0, 0) is vertex 0, texel (0, 1, 0) is vertex 1
            assert_eq!(&outputs.textures[4 * 3..][..3], [0.0, 1.0, 2.0]);
            assert_eq!(&outputs.textures[2 * 3..][..3], [33.0, 34.0, 35.0]);
        }
    }

    #[test]
    fn wrapping_modes() {
        assert_eq!(Wrapping::Repeat.apply(1.25), 0.25);
        assert_eq!(Wrapping::Repeat.apply(-0.25), 0.75);
        assert_eq!(Wrapping::Repeat.apply(1.0), 1.0);
        assert_eq!(Wrapping::ClampToEdge.apply(1.25), 1.0);
        assert_eq!(Wrapping::ClampToEdge.apply(-0.25), 0.0);
        assert_eq!(Wrapping::ClampToEdge.apply(f64::NAN), 0.0);
    }

    #[test]
    fn texel_weights_are_normalized() {
        assert_eq!(texel_weights(1, 0), [1.0 / 3.0; 3]);
        assert_eq!(texel_weights(3, 0), [1.0 / 3.0; 3]);
        assert_eq!(texel_weights(3, 2 * 9 + 2), [0.5, 0.0, 0.5]);
        assert_eq!(texel_weights(3, 9 + 3 + 2), [0.25, 0.25, 0.5]);
    }
}
