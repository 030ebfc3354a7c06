//! Pixel-plane copying from FFmpeg frames into `image` buffers.

use ffmpeg_next::frame::Video as VideoFrame;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{configuration::PixelFormat, error::SamplerError};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width ×
/// bytes per pixel). This strips the padding so the result can be handed
/// to the `from_raw` constructors of the `image` crate.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Build a [`DynamicImage`] from a frame that has already been scaled into
/// `pixel_format`.
pub(crate) fn frame_to_image(
    scaled_frame: &VideoFrame,
    pixel_format: PixelFormat,
) -> Result<DynamicImage, SamplerError> {
    let width = scaled_frame.width();
    let height = scaled_frame.height();
    let buffer = frame_to_buffer(scaled_frame, width, height, pixel_format.bytes_per_pixel());

    let image = match pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, buffer).map(DynamicImage::ImageLuma8)
        }
    };

    image.ok_or_else(|| {
        SamplerError::VideoDecodeError(format!(
            "Failed to construct {pixel_format:?} image ({width}x{height}) from decoded frame data"
        ))
    })
}
