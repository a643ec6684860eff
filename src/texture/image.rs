//! Reading and writing images as tensors.

pub use super::*;

use ::image::{
    codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, ImageReader,
};
use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, Write},
    path::Path,
};

/// Decoding an image to `[I_y, I_x, 3]` with values in `[0, 1]`.
///
/// The first row is the top of the image.
pub fn decode_image<B: Backend, R: BufRead + Seek>(
    reader: R,
    device: &B::Device,
) -> Result<Tensor<B, 3>, Error> {
    let image = ImageReader::new(reader)
        .with_guessed_format()?
        .decode()?
        .to_rgb32f();
    let (size_x, size_y) = image.dimensions();

    #[cfg(debug_assertions)]
    log::debug!(
        target: "softmesh::texture::image",
        "decode_image > size ({size_x} x {size_y})",
    );

    Ok(Tensor::from_values(
        image.into_raw().into_iter().map(f64::from).collect(),
        [size_y as usize, size_x as usize, 3],
        device,
    ))
}

/// Decoding the image file at the path.
pub fn open_image<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<Tensor<B, 3>, Error> {
    decode_image(BufReader::new(File::open(path)?), device)
}

/// Encoding `[I_y, I_x, C]` as an 8-bit PNG.
///
/// `C` is 1 (gray), 3 (RGB) or 4 (RGBA). Values are clamped to `[0, 1]`.
pub fn encode_png<B: Backend, W: Write>(
    image: Tensor<B, 3>,
    writer: W,
) -> Result<(), Error> {
    let [size_y, size_x, channel_count] = image.dims();
    let color_type = match channel_count {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        _ => {
            return Err(Error::Validation(
                format!("The channel count of image ({channel_count})"),
                "1, 3 or 4".into(),
            ))
        },
    };
    let bytes = image
        .into_values()
        .into_iter()
        .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect::<Vec<_>>();

    PngEncoder::new(writer).write_image(
        &bytes,
        size_x as u32,
        size_y as u32,
        color_type,
    )?;

    Ok(())
}

/// Encoding the colors `[C, I_y, I_x]` of a rendered image as a PNG.
pub fn encode_png_channels_first<B: Backend, W: Write>(
    colors: Tensor<B, 3>,
    writer: W,
) -> Result<(), Error> {
    encode_png(colors.swap_dims(0, 1).swap_dims(1, 2), writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::backend::NdArray;
    use std::io::Cursor;

    #[test]
    fn png_keeps_pixels() {
        let device = Default::default();
        let values = vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let image = Tensor::<NdArray, 3>::from_values(values.to_owned(), [2, 2, 3], &device);

        let mut bytes = Vec::new();
        encode_png(image, &mut bytes).unwrap();
        let decoded = decode_image::<NdArray, _>(Cursor::new(bytes), &device).unwrap();

        assert_eq!(decoded.dims(), [2, 2, 3]);
        assert_eq!(decoded.into_values(), values);
    }

    #[test]
    fn channels_first_are_moved_last() {
        let device = Default::default();
        let colors = Tensor::<NdArray, 3>::from_values(
            vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            [3, 1, 2],
            &device,
        );

        let mut bytes = Vec::new();
        encode_png_channels_first(colors, &mut bytes).unwrap();
        let decoded = decode_image::<NdArray, _>(Cursor::new(bytes), &device).unwrap();

        assert_eq!(decoded.into_values(), [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn unsupported_channels_are_rejected() {
        let image = Tensor::<NdArray, 3>::zeros([2, 2, 2], &Default::default());

        let result = encode_png(image, Vec::new());

        assert!(matches!(result, Err(Error::Validation(_, _))));
    }
}
