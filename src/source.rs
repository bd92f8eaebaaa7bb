// ============================================================================
// IMAGE SOURCE — the bundled photograph
// ============================================================================

use crate::error::EnhanceError;
use crate::image_data::{ColorSpace, Image};

/// PNG bytes compiled into the binary.
pub const BUNDLED_IMAGE: &[u8] = include_bytes!("../assets/sky.png");

pub const BUNDLED_NAME: &str = "sky.png";

/// Decode the bundled asset.  It is stored as sRGB.
pub fn load_bundled() -> Result<Image, EnhanceError> {
    decode(BUNDLED_IMAGE, ColorSpace::Srgb)
}

/// Decode an in-memory PNG or JPEG.
pub fn decode(bytes: &[u8], color_space: ColorSpace) -> Result<Image, EnhanceError> {
    let pixels = image::load_from_memory(bytes).map_err(|e| EnhanceError::Conversion(e.to_string()))?;
    Ok(Image::new(pixels, color_space))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_image_decodes() {
        let img = load_bundled().unwrap();
        assert_eq!((img.width(), img.height()), (480, 320));
        assert_eq!(img.color_space(), ColorSpace::Srgb);
    }

    #[test]
    fn garbage_is_a_conversion_error() {
        let err = decode(b"not an image", ColorSpace::Srgb).unwrap_err();
        assert!(matches!(err, EnhanceError::Conversion(_)));
    }
}
