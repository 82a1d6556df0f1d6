//! メール送信モジュール
//!
//! 合成画像を添付して抽出テキストをメールで送る。

pub mod resend;

pub use resend::ResendMailer;

use crate::compositor::CompositeImage;
use crate::error::{ReceiptQrError, Result};
use async_trait::async_trait;
use regex::Regex;

pub const RECEIPT_SUBJECT: &str = "Your Scanned Receipt";
pub const RECEIPT_ATTACHMENT_NAME: &str = "receipt.png";

/// 添付ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// 送信するメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub attachment: Option<Attachment>,
}

impl EmailMessage {
    /// レシート送信用のメールを組み立てる
    pub fn for_receipt(to: &str, extracted_text: &str, composite: &CompositeImage) -> Result<Self> {
        let to = validate_recipient(to)?;
        Ok(Self {
            to,
            subject: RECEIPT_SUBJECT.to_string(),
            body_text: format!("Here is the text from your scanned receipt:\n\n{}", extracted_text),
            attachment: Some(Attachment {
                filename: RECEIPT_ATTACHMENT_NAME.to_string(),
                bytes: composite.png.clone(),
            }),
        })
    }
}

/// 宛先アドレスを検証（前後空白は除去）
pub fn validate_recipient(to: &str) -> Result<String> {
    lazy_static::lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }

    let to = to.trim();
    if EMAIL_RE.is_match(to) {
        Ok(to.to_string())
    } else {
        Err(ReceiptQrError::Email(format!("宛先アドレスが不正です: {}", to)))
    }
}

/// メール送信サービス
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}
