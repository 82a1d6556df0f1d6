//! アプリケーションコンテキスト
//!
//! 設定から各サービスを組み立てる。

use crate::compositor::ImageCompositor;
use crate::config::Config;
use crate::email::ResendMailer;
use crate::error::{ReceiptQrError, Result};
use crate::extractor::GeminiExtractor;
use crate::history::{HistoryStore, JsonFileStore};
use crate::pipeline::UploadPipeline;
use crate::session::{AccountPrompt, IdentityProvider, LocalIdentityProvider, SessionState};
use receipt_qr_common::LayoutConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppContext {
    pub config: Config,
    pub session: Arc<SessionState>,
    pub history: Arc<HistoryStore>,
    pub compositor: ImageCompositor,
    listener: Option<JoinHandle<()>>,
}

impl AppContext {
    /// 設定ファイルの場所に従って組み立てる
    pub fn open(config: Config) -> Result<Self> {
        let provider = LocalIdentityProvider::open(Config::session_path()?, dialoguer_prompt());
        Self::with_provider(config, Arc::new(provider))
    }

    pub fn with_provider(config: Config, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        let store = JsonFileStore::open(&config.data_dir()?)?;
        let history = Arc::new(HistoryStore::new(Arc::new(store), config.request_timeout()));
        let session = Arc::new(SessionState::new(provider, config.no_identity_policy));

        let layout = LayoutConfig {
            max_receipt_edge: Some(config.max_image_size),
            ..LayoutConfig::default()
        };

        Ok(Self {
            config,
            session,
            history,
            compositor: ImageCompositor::new(layout),
            listener: None,
        })
    }

    /// 現在のセッションを反映し、変更通知の購読を始める
    pub async fn start(&mut self) {
        self.session.bootstrap(&self.history).await;
        if self.listener.is_none() {
            self.listener = Some(self.session.spawn_listener(Arc::clone(&self.history)));
        }
    }

    pub fn extractor(&self) -> Result<GeminiExtractor> {
        let api_key = self.config.get_gemini_api_key()?;
        Ok(GeminiExtractor::new(api_key, self.config.model.clone()))
    }

    pub fn mailer(&self) -> Result<ResendMailer> {
        let api_key = self.config.get_resend_api_key()?;
        Ok(ResendMailer::new(api_key, self.config.sender()))
    }

    pub fn pipeline(&self) -> Result<UploadPipeline> {
        Ok(UploadPipeline::new(
            Arc::new(self.extractor()?),
            self.compositor.clone(),
            Arc::clone(&self.history),
            self.config.request_timeout(),
        ))
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// 対話ログイン用のアカウント入力
fn dialoguer_prompt() -> AccountPrompt {
    Arc::new(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("アカウント名（メールアドレス）")
            .interact_text()
            .map_err(|e| ReceiptQrError::Auth(format!("入力を取得できません: {}", e)))
    })
}
