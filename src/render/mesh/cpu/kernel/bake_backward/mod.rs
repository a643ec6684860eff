pub use super::bake::{taps, texel_uv, Arguments};
pub use super::*;

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[I_y, I_x, C]`
    pub image_grad: Vec<f64>,
}

/// Scattering the gradients of the texture grids into the image.
///
/// The UV layout is treated as constant.
///
/// ## Arguments
///
/// * `uv_layout` - `[F, 3, 2]`
/// * `textures_grad` - `[F, T³, C]`
pub fn main(
    arguments: Arguments,
    uv_layout: &[f64],
    textures_grad: &[f64],
) -> Outputs {
    // C
    let channel_count = arguments.channel_count as usize;
    // F
    let face_count = arguments.face_count as usize;
    // T
    let texture_size = arguments.texture_size as usize;
    // T³
    let texel_count = texture_size.pow(3);
    // I_y * I_x * C
    let image_len =
        (arguments.image_size_x * arguments.image_size_y) as usize * channel_count;

    debug_assert_eq!(textures_grad.len(), face_count * texel_count * channel_count);

    let image_grad = textures_grad
        .par_chunks((texel_count * channel_count).max(1))
        .enumerate()
        .fold(
            || GradientBuffer::zeros(image_len),
            |mut image_grad, (face_index, texels_grad)| {
                let uvs = &uv_layout[face_index * 6..][..6];
                let mut buffer = [(0, 0.0); 4];
                texels_grad
                    .chunks_exact(channel_count.max(1))
                    .enumerate()
                    .for_each(|(index, texel_grad)| {
                        let uv = texel_uv(texture_size, index, uvs);
                        let count = taps(&arguments, uv, &mut buffer);
                        buffer[..count].iter().for_each(|&(pixel, weight)| {
                            texel_grad.iter().enumerate().for_each(|(c, grad)| {
                                image_grad.add(pixel * channel_count + c, weight * grad);
                            });
                        });
                    });
                image_grad
            },
        )
        .reduce(|| GradientBuffer::zeros(image_len), GradientBuffer::merge);

    Outputs {
        image_grad: image_grad.into_inner(),
    }
}
