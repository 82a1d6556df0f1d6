//! IDプロバイダ
//!
//! セッションの変更は `watch` チャネルでプッシュ通知する。
//! ローカル実装はセッションをJSONファイルに保存し、
//! 対話ログインではアカウント名を入力してもらう。

use crate::error::{ReceiptQrError, Result};
use async_trait::async_trait;
use receipt_qr_common::{OwnerId, SessionIdentity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// IDプロバイダ
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 現在のセッション
    fn current(&self) -> SessionIdentity;

    /// セッション変更の購読
    fn subscribe(&self) -> watch::Receiver<SessionIdentity>;

    async fn sign_in_interactive(&self) -> Result<SessionIdentity>;

    async fn sign_in_anonymous(&self) -> Result<SessionIdentity>;

    async fn sign_out(&self) -> Result<()>;
}

/// 対話ログインでアカウント名を取得する関数
///
/// 端末入力を待つため、ブロッキングスレッドで呼ばれる。
pub type AccountPrompt = Arc<dyn Fn() -> Result<String> + Send + Sync>;

/// セッションファイルの構造
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    identity: SessionIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account: Option<String>,
}

/// ファイル保存型のローカルIDプロバイダ
pub struct LocalIdentityProvider {
    path: PathBuf,
    sender: watch::Sender<SessionIdentity>,
    account: Mutex<Option<String>>,
    prompt: AccountPrompt,
}

impl LocalIdentityProvider {
    /// セッションファイルを読み込んで開く
    ///
    /// ファイルがなければ未ログイン。壊れている場合も未ログインとして扱う。
    pub fn open(path: impl Into<PathBuf>, prompt: AccountPrompt) -> Self {
        let path = path.into();
        let session = load_session(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "セッションファイルを読み込めません");
            SessionFile::default()
        });
        let (sender, _) = watch::channel(session.identity);
        Self {
            path,
            sender,
            account: Mutex::new(session.account),
            prompt,
        }
    }

    /// ログイン中のアカウント名（匿名・未ログインはNone）
    pub fn account(&self) -> Option<String> {
        self.account
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, identity: SessionIdentity, account: Option<String>) -> Result<SessionIdentity> {
        let file = SessionFile {
            identity: identity.clone(),
            account: account.clone(),
        };
        save_session(&self.path, &file)
            .map_err(|e| ReceiptQrError::Auth(format!("セッションを保存できません: {}", e)))?;

        *self.account.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = account;
        self.sender.send_replace(identity.clone());
        tracing::info!(identity = ?identity, "セッションを更新");
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn current(&self) -> SessionIdentity {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionIdentity> {
        self.sender.subscribe()
    }

    async fn sign_in_interactive(&self) -> Result<SessionIdentity> {
        let prompt = Arc::clone(&self.prompt);
        let account = tokio::task::spawn_blocking(move || prompt())
            .await
            .map_err(|e| ReceiptQrError::Auth(format!("入力を取得できません: {}", e)))??;
        let account = normalize_account(&account)?;
        let owner = account_owner_id(&account);
        self.publish(SessionIdentity::Authenticated(owner), Some(account))
    }

    async fn sign_in_anonymous(&self) -> Result<SessionIdentity> {
        let owner = OwnerId::new(format!("anon-{}", uuid::Uuid::new_v4()));
        self.publish(SessionIdentity::Anonymous(owner), None)
    }

    async fn sign_out(&self) -> Result<()> {
        self.publish(SessionIdentity::Unauthenticated, None)?;
        Ok(())
    }
}

fn load_session(path: &Path) -> Result<SessionFile> {
    if !path.exists() {
        return Ok(SessionFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_session(path: &Path, session: &SessionFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(session)?)?;
    Ok(())
}

/// アカウント名を正規化（前後空白除去・小文字化）
fn normalize_account(account: &str) -> Result<String> {
    let account = account.trim().to_lowercase();
    if account.is_empty() {
        return Err(ReceiptQrError::Auth("アカウント名が空です".into()));
    }
    Ok(account)
}

/// アカウント名から所有者IDを決める
///
/// 同じアカウントなら常に同じID。
pub fn account_owner_id(account: &str) -> OwnerId {
    let digest = Sha256::digest(account.as_bytes());
    OwnerId::new(format!("user-{}", &hex::encode(digest)[..16]))
}
