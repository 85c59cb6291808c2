use crate::error::AssetError;
use crate::model::TextureData;

pub fn decode_texture(bytes: &[u8], path: &str) -> Result<TextureData, AssetError> {
    let img = image::load_from_memory(bytes).map_err(|source| AssetError::Image {
        path: path.to_string(),
        source,
    })?;
    let rgba = img.to_rgba8();
    Ok(TextureData {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn png_decodes_to_rgba() {
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png).unwrap();

        let texture = decode_texture(&png, "obstacle.png").unwrap();
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.rgba.len(), 2 * 3 * 4);
        assert_eq!(&texture.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn undecodable_bytes_name_the_file() {
        let err = decode_texture(&[0, 1, 2, 3], "broken.png").unwrap_err();
        assert!(err.to_string().contains("broken.png"));
    }
}
