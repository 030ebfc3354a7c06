//! Decode a video and report how many frames the sampler would save.
//!
//! Nothing is written to disk.
//!
//! Usage:
//!   cargo run --example count_samples -- <input_file>

use std::error::Error;

use frame_sampler::{DEFAULT_FRAME_INTERVAL, FrameDecoder, PixelFormat};

fn main() -> Result<(), Box<dyn Error>> {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.mp4".to_string());

    println!("Opening {input_path}...");
    let decoder = FrameDecoder::open(&input_path, PixelFormat::Gray8)?;

    let info = decoder.info().clone();
    println!(
        "Video: {}x{}, {:.2} fps, {} [{}]",
        info.width,
        info.height,
        info.frames_per_second,
        info.estimated_frames
            .map(|frames| format!("~{frames} frames"))
            .unwrap_or_else(|| "unknown frame count".to_string()),
        info.codec,
    );

    let mut decoded = 0_u64;
    for result in decoder {
        result?;
        decoded += 1;
    }

    let sampled = decoded.div_ceil(DEFAULT_FRAME_INTERVAL);
    println!("Decoded {decoded} frames; every {DEFAULT_FRAME_INTERVAL}th frame gives {sampled} images");
    Ok(())
}
