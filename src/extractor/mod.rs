//! テキスト抽出モジュール
//!
//! レシート画像（Data URI）から外部AIでテキストを読み取る。
//! 空の結果を「抽出失敗」とみなすのはパイプライン側の責務。

pub mod gemini;

pub use gemini::GeminiExtractor;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 抽出結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub extracted_text: String,
}

impl ExtractionResult {
    /// 前後空白を除いたテキスト（空ならNone）
    pub fn text(&self) -> Option<&str> {
        let text = self.extracted_text.trim();
        (!text.is_empty()).then_some(text)
    }
}

/// テキスト抽出サービス
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image_data_uri: &str) -> Result<ExtractionResult>;
}
