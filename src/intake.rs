//! 画像の取り込み
//!
//! アップロードされた画像（ファイルまたはバイト列）を
//! Data URIに変換する。対応形式はPNG/JPEG/WEBP。

use crate::error::{ReceiptQrError, Result};
use image::ImageFormat;
use receipt_qr_common::data_uri;
use std::path::{Path, PathBuf};

/// 取り込み元
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

const SUPPORTED_FORMATS: &[(ImageFormat, &str)] = &[
    (ImageFormat::Png, "image/png"),
    (ImageFormat::Jpeg, "image/jpeg"),
    (ImageFormat::WebP, "image/webp"),
];

/// 画像を読み込んでData URIにする
pub fn read_as_data_uri(source: &ImageSource) -> Result<String> {
    let bytes = match source {
        ImageSource::Path(path) => std::fs::read(path)
            .map_err(|e| ReceiptQrError::Read(format!("{}: {}", path.display(), e)))?,
        ImageSource::Bytes(bytes) => bytes.clone(),
    };

    let mime_type = sniff_mime_type(&bytes)?;
    Ok(data_uri::encode(mime_type, &bytes))
}

/// 先頭バイトから形式を判定
fn sniff_mime_type(bytes: &[u8]) -> Result<&'static str> {
    if bytes.is_empty() {
        return Err(ReceiptQrError::Read("ファイルが空です".into()));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| ReceiptQrError::Read("画像形式を判定できません".into()))?;

    SUPPORTED_FORMATS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| ReceiptQrError::Read(format!("未対応の画像形式: {:?}（PNG/JPEG/WEBPのみ）", format)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_read_png_bytes() {
        let uri = read_as_data_uri(&ImageSource::Bytes(png_bytes())).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_read_jpeg_magic() {
        let jpeg_header = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
        let uri = read_as_data_uri(&ImageSource::Bytes(jpeg_header)).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_read_empty_is_read_error() {
        let err = read_as_data_uri(&ImageSource::Bytes(Vec::new())).unwrap_err();
        assert!(matches!(err, ReceiptQrError::Read(_)));
    }

    #[test]
    fn test_read_text_is_read_error() {
        let err = read_as_data_uri(&ImageSource::Bytes(b"hello world".to_vec())).unwrap_err();
        assert!(matches!(err, ReceiptQrError::Read(_)));
    }

    #[test]
    fn test_read_unsupported_format() {
        let gif = b"GIF89a\x01\x00\x01\x00".to_vec();
        let err = read_as_data_uri(&ImageSource::Bytes(gif)).unwrap_err();
        assert!(matches!(err, ReceiptQrError::Read(ref m) if m.contains("未対応")));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_as_data_uri(&ImageSource::Path(PathBuf::from("/nonexistent/receipt.png"))).unwrap_err();
        assert!(matches!(err, ReceiptQrError::Read(_)));
    }
}
