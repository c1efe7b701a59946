use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::util::{Error, Result};

/// Write `frame` as PNG or JPEG depending on the extension of `path`.
/// JPEG drops alpha.
pub fn save_image(frame: &RgbaImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)?;
    match format {
        ImageFormat::Png => frame.save_with_format(path, format)?,
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(frame.clone())
            .to_rgb8()
            .save_with_format(path, format)?,
        other => {
            return Err(Error::other(format!(
                "unsupported image format {:?} for {}",
                other,
                path.display()
            )))
        }
    }
    log::info!("Saved {}x{} image to {}", frame.width(), frame.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_save_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbaImage::from_pixel(8, 4, Rgba([200, 10, 10, 255]));

        let png = dir.path().join("frame.png");
        save_image(&frame, &png).unwrap();
        let back = image::open(&png).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (8, 4));
        assert_eq!(back.get_pixel(3, 2), &Rgba([200, 10, 10, 255]));

        let jpg = dir.path().join("frame.jpg");
        save_image(&frame, &jpg).unwrap();
        assert_eq!(image::open(&jpg).unwrap().to_rgb8().dimensions(), (8, 4));
    }

    #[test]
    fn test_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbaImage::new(2, 2);
        assert!(save_image(&frame, &dir.path().join("frame.xyz")).is_err());
        assert!(save_image(&frame, &dir.path().join("frame.bmp")).is_err());
    }
}
