//! Decoded still images.

use std::path::PathBuf;

use crate::error::{ErrorCode, ExportError};

/// An 8-bit RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Bitmap {
    /// Wrap tightly packed RGBA pixels.
    ///
    /// # Panics
    ///
    /// Panics if `rgba.len()` is not `width * height * 4`.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        assert_eq!(
            rgba.len(),
            width as usize * height as usize * 4,
            "RGBA buffer does not match {width}x{height}"
        );
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A single-colour image.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self::new(width, height, color.repeat(pixels))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel bytes, row-major RGBA.
    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }
}

impl From<image::DynamicImage> for Bitmap {
    fn from(image: image::DynamicImage) -> Self {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }
}

/// Produces the bitmap for an image asset. Runs off the loader's queue.
pub trait BitmapLoader: Send {
    /// Load and decode the image.
    fn load(self: Box<Self>) -> Result<Bitmap, ExportError>;
}

/// Decodes an image file with the `image` crate.
#[derive(Debug, Clone)]
pub struct FileBitmapLoader {
    path: PathBuf,
}

impl FileBitmapLoader {
    /// Loader for the image at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BitmapLoader for FileBitmapLoader {
    fn load(self: Box<Self>) -> Result<Bitmap, ExportError> {
        let image = image::open(&self.path)?;
        let bitmap = Bitmap::from(image);
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(ExportError::new(
                ErrorCode::DecodingFailed,
                format!("{} decodes to an empty image", self.path.display()),
            ));
        }
        Ok(bitmap)
    }
}

/// Decodes an encoded image held in memory.
#[derive(Debug, Clone)]
pub struct EncodedBitmapLoader {
    bytes: Vec<u8>,
}

impl EncodedBitmapLoader {
    /// Loader for an encoded image such as PNG or JPEG bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl BitmapLoader for EncodedBitmapLoader {
    fn load(self: Box<Self>) -> Result<Bitmap, ExportError> {
        Ok(Bitmap::from(image::load_from_memory(&self.bytes)?))
    }
}

impl BitmapLoader for Bitmap {
    fn load(self: Box<Self>) -> Result<Bitmap, ExportError> {
        Ok(*self)
    }
}
