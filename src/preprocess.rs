use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::error::{ServiceError, ServiceResult};

/// Side length the model was trained on.
pub const INPUT_SIZE: u32 = 224;

/// NHWC: one image, 224 rows, 224 columns, RGB.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

/// Decodes uploaded bytes in whatever format they sniff as.
pub fn decode(bytes: &[u8]) -> ServiceResult<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Converts to RGB, stretches to 224x224 and scales channels into `[0, 1]`.
pub fn to_tensor(img: &DynamicImage) -> ServiceResult<Array4<f32>> {
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let actual = vec![1, resized.height() as usize, resized.width() as usize, 3];

    let values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    Array4::from_shape_vec(
        (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]),
        values,
    )
    .map_err(|_| ServiceError::InvalidInputShape {
        expected: INPUT_SHAPE.to_vec(),
        actual,
    })
}

pub fn preprocess(bytes: &[u8]) -> ServiceResult<Array4<f32>> {
    let img = decode(bytes)?;
    to_tensor(&img)
}

#[cfg(test)]
pub(crate) fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png)
        .expect("png encoding");
    buf.into_inner()
}
