use base64ct::{Base64, Base64Unpadded, Encoding};
use image::{imageops::FilterType, ImageFormat};
use thiserror::Error;

/// Side length the classifier expects.
pub const INPUT_SIZE: u32 = 224;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageInputError {
    #[error("image is required")]
    Empty,
    #[error("image is not valid base64")]
    InvalidBase64,
    #[error("image could not be decoded")]
    Undecodable,
}

/// RGB pixels in row-major HWC order, each channel scaled to [-1, 1].
#[derive(Debug, Clone)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// `[height][width][rgb]`, the layout of a single model instance.
    pub fn to_nested(&self) -> Vec<Vec<[f32; 3]>> {
        self.data
            .chunks_exact(3 * self.width as usize)
            .take(self.height as usize)
            .map(|row| row.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect())
            .collect()
    }
}

/// Accepts bare base64 or a `data:image/...;base64,` URL.
pub fn decode_base64_image(input: &str) -> Result<Vec<u8>, ImageInputError> {
    let payload = match input.trim() {
        s if s.starts_with("data:") => s
            .split_once("base64,")
            .map(|(_, rest)| rest)
            .ok_or(ImageInputError::InvalidBase64)?,
        s => s,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ImageInputError::Empty);
    }
    Base64::decode_vec(&compact)
        .or_else(|_| Base64Unpadded::decode_vec(&compact))
        .map_err(|_| ImageInputError::InvalidBase64)
}

pub fn mime_type(bytes: &[u8]) -> Result<&'static str, ImageInputError> {
    let format = image::guess_format(bytes).map_err(|_| ImageInputError::Undecodable)?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif => {
            Ok(format.to_mime_type())
        }
        _ => Err(ImageInputError::Undecodable),
    }
}

pub fn to_data_url(bytes: &[u8]) -> Result<String, ImageInputError> {
    let mime = mime_type(bytes)?;
    Ok(format!("data:{};base64,{}", mime, Base64::encode_string(bytes)))
}

/// Decode, convert to RGB, resize to `INPUT_SIZE` square, normalize.
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, ImageInputError> {
    let img = image::load_from_memory(bytes).map_err(|_| ImageInputError::Undecodable)?;
    let rgb = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();
    let data = rgb
        .as_raw()
        .iter()
        .map(|&c| f32::from(c) / 127.5 - 1.0)
        .collect();
    Ok(ImageTensor {
        width: INPUT_SIZE,
        height: INPUT_SIZE,
        data,
    })
}
