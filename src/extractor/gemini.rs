//! Gemini API連携
//!
//! レシート画像をinline_dataとして送り、読み取ったテキストを受け取る。

use super::{ExtractionResult, Extractor};
use crate::error::{ReceiptQrError, Result};
use async_trait::async_trait;
use receipt_qr_common::DataUri;
use serde::{Deserialize, Serialize};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// レシート読み取りプロンプト
pub const EXTRACTION_PROMPT: &str = "\
You are reading a photo of a purchase receipt.
Transcribe the receipt text so it can be stored in a QR code:
- store name, date and time
- each line item with its price
- subtotal, tax and total
Return plain text only, one item per line, without markdown or commentary.
If the image is not a receipt or contains no readable text, return an empty response.";

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini抽出クライアント
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// 接続先を差し替える（プロキシ・検証用）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// 画像付きリクエストを構築
fn build_request(image: &DataUri) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: EXTRACTION_PROMPT.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.base64_payload(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig { temperature: 0.1 },
    }
}

/// レスポンスから本文テキストを取り出す（複数partは連結）
fn response_text(response: &GeminiResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, image_data_uri: &str) -> Result<ExtractionResult> {
        let image = DataUri::parse(image_data_uri)
            .map_err(|e| ReceiptQrError::Extraction(format!("画像のData URIが不正: {}", e)))?;
        let request = build_request(&image);

        tracing::debug!(model = %self.model, bytes = image.bytes.len(), "Gemini APIへ送信");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ReceiptQrError::Extraction(format!("API呼び出し失敗: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReceiptQrError::Extraction(format!(
                "API error: {} {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ReceiptQrError::Extraction(format!("APIレスポンスのパースに失敗: {}", e)))?;

        let text = response_text(&payload);
        tracing::debug!(chars = text.len(), "Gemini APIから応答");
        Ok(ExtractionResult { extracted_text: text })
    }
}
