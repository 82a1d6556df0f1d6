//! ドキュメントストアの抽象
//!
//! 履歴の永続化先。IDはストア側で採番する。

use crate::error::Result;
use async_trait::async_trait;
use receipt_qr_common::{HistoryRecord, NewHistoryRecord, OwnerId};

/// 一括削除の結果
///
/// 削除は1件単位で原子的。失敗したIDはそのまま残る。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchDeleteOutcome {
    pub fn all_deleted(ids: &[String]) -> Self {
        Self {
            deleted: ids.to_vec(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 履歴ドキュメントストア
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 所有者の履歴を新しい順で取得
    async fn query(&self, owner: &OwnerId) -> Result<Vec<HistoryRecord>>;

    /// 履歴を追加し、採番したIDを返す
    async fn insert(&self, record: &NewHistoryRecord) -> Result<String>;

    /// 複数IDを削除
    async fn delete_batch(&self, ids: &[String]) -> Result<BatchDeleteOutcome>;
}
