use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dcv_color_primitives::{convert_image, ColorSpace, ImageFormat, PixelFormat};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use crate::camera::Snapshot;

/// Lossy quality the browser client used for `toDataURL`.
pub const DEFAULT_QUALITY: u8 = 60;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("raster size must be non-zero and even, got {0}x{1}")]
    BadSize(u32, u32),

    #[error("frame buffer is shorter than a {0}x{1} I420 image")]
    ShortFrame(u32, u32),

    #[error("color conversion failed: {0}")]
    Convert(String),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Turns surface snapshots into JPEG data URIs of a fixed size.
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
    resizer: Resizer,
    options: ResizeOptions,
}

impl FrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Result<FrameEncoder, EncodeError> {
        check_size(width, height)?;
        dcv_color_primitives::initialize();
        Ok(FrameEncoder {
            width,
            height,
            quality: quality.clamp(1, 100),
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Rasterize `snapshot` to the output size and encode it.
    ///
    /// The caller checks the surface is ready first; a short or
    /// malformed buffer is an error, not something retried here.
    pub fn capture(&mut self, snapshot: &Snapshot) -> Result<String, EncodeError> {
        let jpeg = self.encode_jpeg(snapshot)?;
        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(jpeg)))
    }

    /// Same as [`capture`](Self::capture) without the data URI wrapping.
    pub fn encode_jpeg(&mut self, snapshot: &Snapshot) -> Result<Vec<u8>, EncodeError> {
        let (src_width, src_height) = (snapshot.width(), snapshot.height());
        check_size(src_width, src_height)?;
        let planes = snapshot
            .planes()
            .ok_or(EncodeError::ShortFrame(src_width, src_height))?;

        let bgra = i420_to_bgra(src_width, src_height, &planes)?;
        let bgra = if (src_width, src_height) == (self.width, self.height) {
            bgra
        } else {
            self.resize(&bgra, src_width, src_height)?
        };

        //bgra转rgb
        let mut rgb = Vec::with_capacity(bgra.len() / 4 * 3);
        for pixel in bgra.chunks_exact(4) {
            rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &rgb,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(jpeg)
    }

    fn resize(&mut self, bgra: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
        let src = ImageRef::new(width, height, bgra, PixelType::U8x4)
            .map_err(|err| EncodeError::Resize(err.to_string()))?;
        let mut dst = Image::new(self.width, self.height, PixelType::U8x4);
        self.resizer
            .resize(&src, &mut dst, &self.options)
            .map_err(|err| EncodeError::Resize(err.to_string()))?;
        Ok(dst.into_vec())
    }
}

fn check_size(width: u32, height: u32) -> Result<(), EncodeError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(EncodeError::BadSize(width, height));
    }
    Ok(())
}

fn i420_to_bgra(width: u32, height: u32, planes: &[&[u8]; 3]) -> Result<Vec<u8>, EncodeError> {
    let src_format = ImageFormat {
        pixel_format: PixelFormat::I420,
        color_space: ColorSpace::Bt601,
        num_planes: 3,
    };
    let dst_format = ImageFormat {
        pixel_format: PixelFormat::Bgra,
        color_space: ColorSpace::Rgb,
        num_planes: 1,
    };

    let mut bgra = vec![0u8; width as usize * height as usize * 4];
    convert_image(
        width,
        height,
        &src_format,
        None,
        &[planes[0], planes[1], planes[2]],
        &dst_format,
        None,
        &mut [&mut bgra[..]],
    )
    .map_err(|err| EncodeError::Convert(format!("{:?}", err)))?;
    Ok(bgra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::i420_plane_sizes;

    fn gray_snapshot(width: u32, height: u32) -> Snapshot {
        let total: usize = i420_plane_sizes(width, height).iter().sum();
        Snapshot::new(width, height, vec![128; total])
    }

    fn decode(data_uri: &str) -> Vec<u8> {
        let payload = data_uri.strip_prefix(DATA_URI_PREFIX).expect("jpeg data uri");
        STANDARD.decode(payload).unwrap()
    }

    #[test]
    fn capture_produces_jpeg_data_uri() {
        let mut encoder = FrameEncoder::new(64, 48, DEFAULT_QUALITY).unwrap();
        let uri = encoder.capture(&gray_snapshot(64, 48)).unwrap();
        let jpeg = decode(&uri);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn capture_resizes_to_output_raster() {
        let mut encoder = FrameEncoder::new(32, 24, DEFAULT_QUALITY).unwrap();
        let jpeg = encoder.encode_jpeg(&gray_snapshot(64, 48)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn capture_downscales_default_camera_frame() {
        let mut encoder = FrameEncoder::new(400, 300, DEFAULT_QUALITY).unwrap();
        for _ in 0..2 {
            let jpeg = encoder.encode_jpeg(&gray_snapshot(640, 480)).unwrap();
            let decoded = image::load_from_memory(&jpeg).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (400, 300));
        }
    }

    #[test]
    fn short_frame_is_rejected() {
        let mut encoder = FrameEncoder::new(64, 48, DEFAULT_QUALITY).unwrap();
        let snapshot = Snapshot::new(64, 48, vec![0; 100]);
        assert!(matches!(
            encoder.capture(&snapshot),
            Err(EncodeError::ShortFrame(64, 48))
        ));
    }

    #[test]
    fn odd_output_size_is_rejected() {
        assert!(matches!(
            FrameEncoder::new(33, 24, DEFAULT_QUALITY),
            Err(EncodeError::BadSize(33, 24))
        ));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameEncoder::new(8, 8, 0).unwrap().quality(), 1);
        assert_eq!(FrameEncoder::new(8, 8, 250).unwrap().quality(), 100);
    }
}
