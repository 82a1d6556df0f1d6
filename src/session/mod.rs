//! セッション管理
//!
//! IDプロバイダからの変更通知を受けて履歴の所有者を切り替える。
//! 「セッションなし」の扱いは配置ごとに1つのポリシーで決める。

pub mod identity;

pub use identity::{account_owner_id, AccountPrompt, IdentityProvider, LocalIdentityProvider};

use crate::error::{ReceiptQrError, Result};
use crate::history::HistoryStore;
use clap::ValueEnum;
use receipt_qr_common::SessionIdentity;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// セッションがないときの方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NoIdentityPolicy {
    /// 未ログインのまま（対話ログインを待つ）
    StayUnauthenticated,
    /// 匿名セッションを自動作成
    Anonymous,
}

impl std::fmt::Display for NoIdentityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoIdentityPolicy::StayUnauthenticated => write!(f, "stay-unauthenticated"),
            NoIdentityPolicy::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// 現在のセッションと遷移中カウンタ
pub struct SessionState {
    provider: Arc<dyn IdentityProvider>,
    policy: NoIdentityPolicy,
    /// 実行中の遷移の数
    transitions: AtomicUsize,
}

/// 遷移が終わる（またはfutureが破棄される）とカウンタを戻す
struct TransitionGuard<'a>(&'a AtomicUsize);

impl<'a> TransitionGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionState {
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: NoIdentityPolicy) -> Self {
        Self {
            provider,
            policy,
            transitions: AtomicUsize::new(0),
        }
    }

    pub fn identity(&self) -> SessionIdentity {
        self.provider.current()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitions.load(Ordering::SeqCst) > 0
    }

    pub fn policy(&self) -> NoIdentityPolicy {
        self.policy
    }

    pub async fn sign_in_interactive(&self) -> Result<SessionIdentity> {
        self.transition(self.provider.sign_in_interactive()).await
    }

    pub async fn sign_in_anonymous(&self) -> Result<SessionIdentity> {
        self.transition(self.provider.sign_in_anonymous()).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.transition(self.provider.sign_out()).await
    }

    /// 遷移中カウンタを進めてプロバイダ呼び出しを待つ
    ///
    /// 失敗はAuthErrorにそろえる。現在のセッションはプロバイダが
    /// 通知しない限り変わらない。
    async fn transition<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = TransitionGuard::enter(&self.transitions);
        fut.await.map_err(|err| match err {
            ReceiptQrError::Auth(_) => err,
            other => ReceiptQrError::Auth(other.to_string()),
        })
    }

    fn needs_anonymous(&self, identity: &SessionIdentity) -> bool {
        identity.owner_id().is_none() && self.policy == NoIdentityPolicy::Anonymous
    }

    /// セッション変更ハンドラ
    ///
    /// 履歴の所有者を切り替え、新しい所有者の取得を行う。
    /// 匿名ポリシーでセッションがなければ匿名セッションを要求する。
    pub async fn on_identity_change(&self, identity: SessionIdentity, history: &HistoryStore) {
        if self.needs_anonymous(&identity) {
            history.set_owner(None);
            match self.sign_in_anonymous().await {
                Ok(anonymous) => {
                    if switch_owner(&anonymous, history) {
                        refresh_history(history).await;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "匿名セッションを作成できません"),
            }
            return;
        }
        if switch_owner(&identity, history) {
            refresh_history(history).await;
        }
    }

    /// 起動時のセッションを反映
    pub async fn bootstrap(&self, history: &HistoryStore) {
        self.on_identity_change(self.identity(), history).await;
    }

    /// 変更通知の購読を開始
    ///
    /// 所有者の切り替えは通知を受けたその場で行い、取得と匿名セッションの
    /// 作成は別タスクに任せる。取得中も次の通知を処理できる。
    /// 返したJoinHandleをabortするまで続く。
    pub fn spawn_listener(self: &Arc<Self>, history: Arc<HistoryStore>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut rx = self.provider.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                tracing::debug!(identity = ?identity, "セッション変更を受信");

                if session.needs_anonymous(&identity) {
                    history.set_owner(None);
                    let session = Arc::clone(&session);
                    let history = Arc::clone(&history);
                    tokio::spawn(async move { session.on_identity_change(identity, &history).await });
                } else if switch_owner(&identity, &history) {
                    let history = Arc::clone(&history);
                    tokio::spawn(async move { refresh_history(&history).await });
                }
            }
        })
    }
}

/// 所有者を切り替え、取得が必要ならtrue
fn switch_owner(identity: &SessionIdentity, history: &HistoryStore) -> bool {
    let owner = identity.owner_id().cloned();
    let has_owner = owner.is_some();
    if !history.set_owner(owner) {
        tracing::debug!("所有者に変化なし");
        return false;
    }
    has_owner
}

async fn refresh_history(history: &HistoryStore) {
    if let Err(err) = history.refresh().await {
        tracing::warn!(error = %err, "履歴を取得できません");
    }
}
