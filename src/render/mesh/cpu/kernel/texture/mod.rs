//! Sampling the per-face texture grids with barycentric coordinates.
//!
//! A face owns `T³` texels indexed by `(i, j, k)`, where the grid position
//! is `(w0, w1, w2) · (T - 1)`.

pub use super::*;

/// Interpolation within a face grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    #[default]
    Trilinear,
}

/// One of the texels contributing to a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tap {
    /// Texel index in `[T³]`
    pub index: usize,
    pub weight: f64,
    /// `∂weight / ∂w_k`
    pub weight_grad: [f64; 3],
}

/// Listing the texels that contribute to a sample at `barycentric`.
///
/// Returns the number of valid taps.
pub fn taps(
    texture_size: usize,
    filter: Filter,
    barycentric: [f64; 3],
    taps: &mut [Tap; 8],
) -> usize {
    let size = texture_size.max(1);
    let scale = (size - 1) as f64;
    let index_max = size - 1;
    let positions = barycentric.map(|w| (w * scale).clamp(0.0, scale));

    if filter == Filter::Nearest || size == 1 {
        let [i, j, k] = positions.map(|p| (p.round() as usize).min(index_max));
        taps[0] = Tap {
            index: (i * size + j) * size + k,
            weight: 1.0,
            weight_grad: [0.0; 3],
        };
        return 1;
    }

    let bases = positions.map(|p| (p.floor() as usize).min(index_max));
    let fractions = [0, 1, 2].map(|axis| positions[axis] - bases[axis] as f64);

    (0..8).for_each(|corner| {
        let mut indices = [0; 3];
        let mut factors = [0.0; 3];
        let mut factors_grad = [0.0; 3];
        (0..3).for_each(|axis| {
            if (corner >> axis) & 1 == 0 {
                indices[axis] = bases[axis];
                factors[axis] = 1.0 - fractions[axis];
                factors_grad[axis] = -scale;
            } else {
                indices[axis] = (bases[axis] + 1).min(index_max);
                factors[axis] = fractions[axis];
                factors_grad[axis] = scale;
            }
        });
        let [i, j, k] = indices;
        taps[corner] = Tap {
            index: (i * size + j) * size + k,
            weight: factors[0] * factors[1] * factors[2],
            weight_grad: [
                factors_grad[0] * factors[1] * factors[2],
                factors[0] * factors_grad[1] * factors[2],
                factors[0] * factors[1] * factors_grad[2],
            ],
        };
    });

    8
}

/// Sampling the color of one face.
///
/// ## Arguments
///
/// * `texels` - `[T³, C]`
/// * `color` - `[C]`, overwritten
pub fn sample(
    texels: &[f64],
    texture_size: usize,
    filter: Filter,
    barycentric: [f64; 3],
    color: &mut [f64],
) {
    let channel_count = color.len();
    let mut buffer = [Tap::default(); 8];
    let count = taps(texture_size, filter, barycentric, &mut buffer);

    color.fill(0.0);
    buffer[..count].iter().for_each(|tap| {
        let texel = &texels[tap.index * channel_count..][..channel_count];
        color
            .iter_mut()
            .zip(texel)
            .for_each(|(c, t)| *c += tap.weight * t);
    });
}

/// Scattering `color_grad` into `texels_grad` and returning the gradient
/// of the barycentric coordinates.
///
/// ## Arguments
///
/// * `texels` - `[T³, C]`
/// * `texels_grad` - `[T³, C]`, accumulated
pub fn sample_backward(
    texels: &[f64],
    texture_size: usize,
    filter: Filter,
    barycentric: [f64; 3],
    color_grad: &[f64],
    texels_grad: &mut [f64],
) -> [f64; 3] {
    let channel_count = color_grad.len();
    let mut buffer = [Tap::default(); 8];
    let count = taps(texture_size, filter, barycentric, &mut buffer);
    let mut barycentric_grad = [0.0; 3];

    buffer[..count].iter().for_each(|tap| {
        let offset = tap.index * channel_count;
        let texel = &texels[offset..][..channel_count];
        let texel_grad = &mut texels_grad[offset..][..channel_count];
        let mut dot = 0.0;
        (0..channel_count).for_each(|c| {
            texel_grad[c] += tap.weight * color_grad[c];
            dot += texel[c] * color_grad[c];
        });
        (0..3).for_each(|k| barycentric_grad[k] += tap.weight_grad[k] * dot);
    });

    barycentric_grad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_texture_samples_constant_color() {
        let texture_size: usize = 4;
        let texels = [0.25, 0.5, 0.75].repeat(texture_size.pow(3));
        let mut color = [0.0; 3];

        [
            [1.0, 0.0, 0.0],
            [0.2, 0.3, 0.5],
            [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
            [0.0, 0.0, 1.0],
        ]
        .into_iter()
        .for_each(|barycentric| {
            for filter in [Filter::Nearest, Filter::Trilinear] {
                sample(&texels, texture_size, filter, barycentric, &mut color);
                assert!((color[0] - 0.25).abs() < 1e-12, "{color:?}");
                assert!((color[1] - 0.5).abs() < 1e-12, "{color:?}");
                assert!((color[2] - 0.75).abs() < 1e-12, "{color:?}");
            }
        });
    }

    #[test]
    fn trilinear_reaches_grid_corners() {
        let texture_size: usize = 2;
        let texels = (0..8).map(|i| i as f64).collect::<Vec<_>>();
        let mut color = [0.0];

        sample(&texels, texture_size, Filter::Trilinear, [1.0, 0.0, 0.0], &mut color);
        assert_eq!(color[0], 4.0);
        sample(&texels, texture_size, Filter::Trilinear, [0.0, 1.0, 0.0], &mut color);
        assert_eq!(color[0], 2.0);
        sample(&texels, texture_size, Filter::Trilinear, [0.0, 0.0, 1.0], &mut color);
        assert_eq!(color[0], 1.0);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let texture_size: usize = 3;
        let channel_count: usize = 2;
        let texels = (0..texture_size.pow(3) * channel_count)
            .map(|i| ((i * 37 % 11) as f64 / 11.0).sin())
            .collect::<Vec<_>>();
        let barycentric = [0.23, 0.41, 0.36];
        let color_grad = [0.7, -1.3];

        let mut texels_grad = vec![0.0; texels.len()];
        let barycentric_grad = sample_backward(
            &texels,
            texture_size,
            Filter::Trilinear,
            barycentric,
            &color_grad,
            &mut texels_grad,
        );

        let loss = |texels: &[f64], barycentric: [f64; 3]| {
            let mut color = [0.0; 2];
            sample(texels, texture_size, Filter::Trilinear, barycentric, &mut color);
            color[0] * color_grad[0] + color[1] * color_grad[1]
        };
        let step = 1e-6;
        (0..3).for_each(|k| {
            let mut plus = barycentric;
            let mut minus = barycentric;
            plus[k] += step;
            minus[k] -= step;
            let numeric = (loss(&texels, plus) - loss(&texels, minus)) / (2.0 * step);
            assert!((numeric - barycentric_grad[k]).abs() < 1e-6);
        });
        (0..texels.len()).for_each(|index| {
            let mut plus = texels.to_owned();
            plus[index] += step;
            let numeric = (loss(&plus, barycentric) - loss(&texels, barycentric)) / step;
            assert!((numeric - texels_grad[index]).abs() < 1e-6);
        });
    }
}
