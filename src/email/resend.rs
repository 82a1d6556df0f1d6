//! Resend API によるメール送信

use super::{EmailMessage, Mailer};
use crate::error::{ReceiptQrError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload<'a>>,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    /// base64（Data URIのプレフィックスなし）
    content: String,
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
            endpoint: RESEND_API_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn build_request<'a>(from: &'a str, message: &'a EmailMessage) -> SendRequest<'a> {
    SendRequest {
        from,
        to: vec![message.to.as_str()],
        subject: &message.subject,
        text: &message.body_text,
        attachments: message
            .attachment
            .iter()
            .map(|a| AttachmentPayload {
                filename: &a.filename,
                content: STANDARD.encode(&a.bytes),
            })
            .collect(),
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let request = build_request(&self.from, message);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReceiptQrError::Email(format!("送信に失敗: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReceiptQrError::Email(format!(
                "Resend error: {} {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        tracing::info!(to = %message.to, "メールを送信");
        Ok(())
    }
}
