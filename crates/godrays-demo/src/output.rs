//! PNG output of read-back frames.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Errors writing an output image.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: png::EncodingError,
    },
}

/// Convert a linear texel to 8-bit display RGBA.
///
/// HDR values are Reinhard-compressed first; alpha is stored linearly.
pub fn to_display(texel: [f32; 4], hdr: bool) -> [u8; 4] {
    let encode = |c: f32| {
        let c = c.max(0.0);
        let c = if hdr { c / (1.0 + c) } else { c.min(1.0) };
        (c.powf(1.0 / 2.2) * 255.0).round() as u8
    };
    [
        encode(texel[0]),
        encode(texel[1]),
        encode(texel[2]),
        (texel[3].clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

/// Write `texels` (rows top to bottom) as an 8-bit RGBA PNG.
pub fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    texels: &[[f32; 4]],
    hdr: bool,
) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let encode_err = |source| OutputError::Encode {
        path: path.to_path_buf(),
        source,
    };

    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(encode_err)?;

    let data: Vec<u8> = texels.iter().flat_map(|&t| to_display(t, hdr)).collect();
    writer.write_image_data(&data).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    Ok(())
}

/// `frame.png` -> `frame-reference.png`.
pub fn reference_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "godrays".to_string());
    path.with_file_name(format!("{stem}-reference.png"))
}
