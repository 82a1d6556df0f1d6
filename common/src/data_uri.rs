//! Data URI の変換
//!
//! "data:image/jpeg;base64,/9j/4AAQ..." 形式の文字列とバイト列を相互変換する。
//! レシート画像は履歴にData URIのまま保存される。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// デコード済みData URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Data URI文字列をパース
    ///
    /// base64形式のみ対応。MIMEタイプが省略されている場合は
    /// "application/octet-stream" とみなす。
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| Error::DataUri("\"data:\" で始まっていません".into()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::DataUri("カンマがありません".into()))?;

        let header = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::DataUri("base64形式ではありません".into()))?;

        let mime_type = header.split(';').next().unwrap_or_default();
        let mime_type = if mime_type.is_empty() {
            "application/octet-stream"
        } else {
            mime_type
        };

        let bytes = STANDARD.decode(payload.trim())?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Data URI文字列に変換
    pub fn to_uri(&self) -> String {
        encode(&self.mime_type, &self.bytes)
    }

    /// base64部分のみ（API送信用）
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// バイト列をData URI文字列に変換
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Data URIからMIMEタイプのみ取り出す（デコードしない）
pub fn mime_type_of(uri: &str) -> Option<&str> {
    uri.strip_prefix("data:")
        .and_then(|s| s.split([';', ',']).next())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png_uri() {
        let uri = "data:image/png;base64,iVBORw0KGgo=";
        let parsed = DataUri::parse(uri).unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(&parsed.bytes[..4], &[0x89, b'P', b'N', b'G']);
        assert_eq!(parsed.to_uri(), uri);
    }

    #[test]
    fn test_parse_without_mime() {
        let parsed = DataUri::parse("data:;base64,AAEC").unwrap();
        assert_eq!(parsed.mime_type, "application/octet-stream");
        assert_eq!(parsed.bytes, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_rejects_non_data_uri() {
        assert!(matches!(DataUri::parse("https://example.com/a.png"), Err(Error::DataUri(_))));
    }

    #[test]
    fn test_parse_rejects_plain_text_payload() {
        assert!(matches!(DataUri::parse("data:text/plain,hello"), Err(Error::DataUri(_))));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(matches!(DataUri::parse("data:image/png;base64,@@@"), Err(Error::Base64(_))));
    }

    #[test]
    fn test_mime_type_of() {
        assert_eq!(mime_type_of("data:image/jpeg;base64,AAAA"), Some("image/jpeg"));
        assert_eq!(mime_type_of("data:;base64,AAAA"), None);
        assert_eq!(mime_type_of("image/jpeg"), None);
    }

    #[test]
    fn test_base64_payload() {
        let uri = DataUri::new("image/png", vec![1, 2, 3]);
        assert_eq!(uri.base64_payload(), "AQID");
    }
}
