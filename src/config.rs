use crate::error::{ReceiptQrError, Result};
use crate::session::NoIdentityPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub resend_api_key: Option<String>,
    pub sender_email: Option<String>,
    pub model: String,
    pub max_image_size: u32,
    pub timeout_seconds: u64,
    pub no_identity_policy: NoIdentityPolicy,
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            resend_api_key: None,
            sender_email: None,
            model: "gemini-2.0-flash".into(),
            max_image_size: 2048, // メール添付サイズを抑えるための上限
            timeout_seconds: 60,
            no_identity_policy: NoIdentityPolicy::Anonymous,
            data_dir: None,
            log_level: "info".into(),
        }
    }
}

/// 送信元未設定時のResendテスト用アドレス
pub const DEFAULT_SENDER: &str = "onboarding@resend.dev";

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReceiptQrError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("receipt-qr"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// セッションファイルの保存先
    pub fn session_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("session.json"))
    }

    /// 履歴ストアの保存先ディレクトリ
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| ReceiptQrError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("receipt-qr"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn get_gemini_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.gemini_api_key.clone().ok_or(ReceiptQrError::MissingApiKey("Gemini"))
    }

    pub fn get_resend_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("RESEND_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.resend_api_key.clone().ok_or(ReceiptQrError::MissingApiKey("Resend"))
    }

    pub fn sender(&self) -> String {
        std::env::var("RESEND_FROM_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.sender_email.clone())
            .unwrap_or_else(|| DEFAULT_SENDER.to_string())
    }

    pub fn set_gemini_api_key(&mut self, key: String) -> Result<()> {
        self.gemini_api_key = Some(key);
        self.save()
    }

    pub fn set_resend_api_key(&mut self, key: String) -> Result<()> {
        self.resend_api_key = Some(key);
        self.save()
    }

    pub fn set_sender(&mut self, sender: String) -> Result<()> {
        self.sender_email = Some(sender);
        self.save()
    }

    pub fn set_policy(&mut self, policy: NoIdentityPolicy) -> Result<()> {
        self.no_identity_policy = policy;
        self.save()
    }
}
