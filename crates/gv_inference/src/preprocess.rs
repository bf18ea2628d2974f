use std::io::Cursor;

use gv_core::{Error, InputTensor, Result, INPUT_SHAPE, INPUT_SIZE, PIXEL_SCALE};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::Array4;

/// An upload after resizing: the preview shown back to the user and the tensor fed to the model.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub preview: RgbImage,
    pub tensor: InputTensor,
}

impl LoadedImage {
    pub fn preview_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.preview
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| Error::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

/// Like [`load_image`], but an absent or empty upload yields `None`.
pub fn load_image_opt(bytes: Option<&[u8]>) -> Result<Option<LoadedImage>> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => load_image(bytes).map(Some),
        _ => Ok(None),
    }
}

/// Decode a PNG or JPEG upload into an RGB 256x256 preview and a normalized (1, 256, 256, 3) tensor.
pub fn load_image(bytes: &[u8]) -> Result<LoadedImage> {
    let format = image::guess_format(bytes)
        .map_err(|_| Error::UnsupportedFormat("unrecognized file type".to_string()))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(Error::UnsupportedFormat(format!(
            "{:?} (expected PNG or JPEG)",
            format
        )));
    }

    let image = image::load_from_memory_with_format(bytes, format)?;
    let preview = resize_rgb(&image);
    let tensor = to_tensor(&preview);
    Ok(LoadedImage { preview, tensor })
}

/// Drop alpha / expand grayscale to RGB, then stretch to the model's square input.
pub fn resize_rgb(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (INPUT_SIZE, INPUT_SIZE) {
        return rgb;
    }
    imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
}

pub fn to_tensor(image: &RgbImage) -> InputTensor {
    let shape = (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]);
    let array = Array4::from_shape_fn(shape, |(_, y, x, c)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / PIXEL_SCALE
    });
    InputTensor::new(array)
}
