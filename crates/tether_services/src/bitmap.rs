//! Image loading for script-facing APIs

use crate::error::Result;
use crate::paths::PathResolver;
use tether_core::{Hashtable, NativeValue, OpaquePointer};

/// Decoded image, 8-bit RGBA, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// `{ width, height, pixels }` for handing to a script.
    pub fn to_native(&self) -> Hashtable {
        let mut table = Hashtable::new();
        table.insert("width".to_string(), NativeValue::from(self.width));
        table.insert("height".to_string(), NativeValue::from(self.height));
        table.insert("pixels".to_string(), NativeValue::from(self.pixels.as_slice()));
        table
    }
}

pub trait BitmapDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap>;
}

/// PNG and JPEG through the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl BitmapDecoder for ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Bitmap {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }
}

/// Read and decode `filename` inside the base directory a script named.
pub fn get_bitmap(
    paths: &dyn PathResolver,
    decoder: &dyn BitmapDecoder,
    filename: &str,
    base_dir: OpaquePointer,
) -> Result<Bitmap> {
    let path = paths.path_for_pointer(filename, base_dir)?;
    tracing::debug!(path = %path.display(), "loading bitmap");
    let bytes = std::fs::read(&path)?;
    decoder.decode(&bytes)
}
