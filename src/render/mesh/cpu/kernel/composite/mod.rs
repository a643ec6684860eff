//! Blending the fragments of one pixel by their soft depth order.

pub use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arguments {
    /// `f`
    pub depth_far: f64,
    /// `n`
    pub depth_near: f64,
    /// `γ`
    pub depth_softness: f64,
}

/// A fragment as seen by the compositor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Layer {
    /// `D`
    pub coverage: f64,
    /// `z`
    pub depth: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerGrad {
    pub coverage: f64,
    pub depth: f64,
}

/// The composited values of one pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pixel {
    pub depth: f64,
    /// `max(ε_b, max(z̃))`
    pub depth_max: f64,
    /// `Z`
    pub normalizer: f64,
    pub silhouette: f64,
}

/// `ε_b`, the normalized depth of the background.
pub const BACKGROUND_DEPTH: f64 = 1e-3;

impl Arguments {
    /// `z̃ = (f - z) / (f - n)`
    #[inline]
    pub fn depth_normalized(
        &self,
        depth: f64,
    ) -> f64 {
        (self.depth_far - depth) / (self.depth_far - self.depth_near)
    }

    /// `exp((z̃ - z̃max) / γ)`
    #[inline]
    pub fn depth_weight(
        &self,
        depth: f64,
        depth_max: f64,
    ) -> f64 {
        ((self.depth_normalized(depth) - depth_max) / self.depth_softness).exp()
    }
}

/// Compositing the layers of one pixel.
///
/// ## Arguments
///
/// * `colors` - `[L, C]`
/// * `background` - `[C]`
/// * `color` - `[C]`, overwritten
pub fn forward(
    arguments: &Arguments,
    layers: &[Layer],
    colors: &[f64],
    background: &[f64],
    color: &mut [f64],
) -> Pixel {
    let channel_count = background.len();
    debug_assert_eq!(colors.len(), layers.len() * channel_count);

    let depth_max = layers.iter().fold(BACKGROUND_DEPTH, |max, layer| {
        max.max(arguments.depth_normalized(layer.depth))
    });
    let background_weight =
        ((BACKGROUND_DEPTH - depth_max) / arguments.depth_softness).exp();

    let mut normalizer = background_weight;
    let mut depth = background_weight * arguments.depth_far;
    let mut transmittance = 1.0;
    color
        .iter_mut()
        .zip(background)
        .for_each(|(c, b)| *c = background_weight * b);

    layers
        .iter()
        .zip(colors.chunks_exact(channel_count.max(1)))
        .for_each(|(layer, layer_color)| {
            let weight =
                layer.coverage * arguments.depth_weight(layer.depth, depth_max);
            normalizer += weight;
            depth += weight * layer.depth;
            transmittance *= 1.0 - layer.coverage;
            color
                .iter_mut()
                .zip(layer_color)
                .for_each(|(c, l)| *c += weight * l);
        });

    color.iter_mut().for_each(|c| *c /= normalizer);

    Pixel {
        depth: depth / normalizer,
        depth_max,
        normalizer,
        silhouette: 1.0 - transmittance,
    }
}

/// Computing the gradients of every layer from the gradients of the pixel.
///
/// ## Arguments
///
/// * `colors` - `[L, C]`
/// * `color` - `[C]`, the composited color
/// * `color_grad` - `[C]`
/// * `layer_grads` - `[L]`, overwritten
/// * `colors_grad` - `[L, C]`, overwritten
#[allow(clippy::too_many_arguments)]
pub fn backward(
    arguments: &Arguments,
    layers: &[Layer],
    colors: &[f64],
    pixel: &Pixel,
    color: &[f64],
    color_grad: &[f64],
    depth_grad: f64,
    silhouette_grad: f64,
    layer_grads: &mut [LayerGrad],
    colors_grad: &mut [f64],
) {
    let channel_count = color.len();
    let layer_count = layers.len();
    if layer_count == 0 {
        return;
    }

    // Ō
    let output_dot = color
        .iter()
        .zip(color_grad)
        .map(|(c, g)| c * g)
        .sum::<f64>()
        + pixel.depth * depth_grad;
    let depth_range = arguments.depth_far - arguments.depth_near;

    // Π_{k<j} (1 - D_k) and Π_{k>j} (1 - D_k)
    let mut transmittances_before = vec![1.0; layer_count];
    let mut transmittances_after = vec![1.0; layer_count];
    (1..layer_count).for_each(|j| {
        transmittances_before[j] =
            transmittances_before[j - 1] * (1.0 - layers[j - 1].coverage);
    });
    (0..layer_count - 1).rev().for_each(|j| {
        transmittances_after[j] =
            transmittances_after[j + 1] * (1.0 - layers[j + 1].coverage);
    });

    layers
        .iter()
        .zip(colors.chunks_exact(channel_count.max(1)))
        .zip(colors_grad.chunks_exact_mut(channel_count.max(1)))
        .enumerate()
        .for_each(|(j, ((layer, layer_color), layer_color_grad))| {
            let depth_weight = arguments.depth_weight(layer.depth, pixel.depth_max);
            // w_j
            let weight = layer.coverage * depth_weight / pixel.normalizer;
            // q_j
            let layer_dot = layer_color
                .iter()
                .zip(color_grad)
                .map(|(c, g)| c * g)
                .sum::<f64>()
                + layer.depth * depth_grad;
            let difference = layer_dot - output_dot;

            let depth_normalized_grad =
                difference * weight / arguments.depth_softness;

            layer_grads[j] = LayerGrad {
                coverage: difference * depth_weight / pixel.normalizer
                    + silhouette_grad
                        * transmittances_before[j]
                        * transmittances_after[j],
                depth: depth_grad * weight - depth_normalized_grad / depth_range,
            };
            layer_color_grad
                .iter_mut()
                .zip(color_grad)
                .for_each(|(g, c)| *g = c * weight);
        });
}
