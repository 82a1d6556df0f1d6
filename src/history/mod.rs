//! 履歴ストア
//!
//! 現在の所有者の履歴一覧をメモリに保持し、ドキュメントストアと同期する。
//!
//! - 所有者が変わるたびに世代番号を進め、古い世代の結果は捨てる
//! - 一覧は「最後に取得できた内容」と「成功したローカル操作」の和集合
//! - 取得中の追加は、取得完了時に取得結果へ合流させる

pub mod file_store;
pub mod store;

pub use file_store::JsonFileStore;
pub use store::{BatchDeleteOutcome, DocumentStore};

use crate::bounded::bounded;
use crate::error::{ReceiptQrError, Result};
use receipt_qr_common::{sort_newest_first, HistoryRecord, NewHistoryRecord, OwnerId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 一覧の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPhase {
    Loading,
    Ready,
}

#[derive(Debug)]
struct HistoryState {
    owner: Option<OwnerId>,
    /// 所有者が変わるたびに進む
    generation: u64,
    /// 取得を開始するたびに進む
    fetch_seq: u64,
    phase: HistoryPhase,
    records: Vec<HistoryRecord>,
    /// 直近の取得開始以降に追加したもの
    appended_since_fetch: Vec<HistoryRecord>,
    /// 直近の取得開始以降に削除したID
    deleted_since_fetch: HashSet<String>,
    last_error: Option<String>,
}

impl HistoryState {
    fn reset_sync_marks(&mut self) {
        self.appended_since_fetch.clear();
        self.deleted_since_fetch.clear();
    }
}

/// 所有者単位の履歴ストア
pub struct HistoryStore {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
    state: Mutex<HistoryState>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            state: Mutex::new(HistoryState {
                owner: None,
                generation: 0,
                fetch_seq: 0,
                phase: HistoryPhase::Ready,
                records: Vec::new(),
                appended_since_fetch: Vec::new(),
                deleted_since_fetch: HashSet::new(),
                last_error: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 新しい順の履歴一覧
    pub fn list(&self) -> Vec<HistoryRecord> {
        self.state().records.clone()
    }

    pub fn get(&self, id: &str) -> Option<HistoryRecord> {
        self.state().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    pub fn phase(&self) -> HistoryPhase {
        self.state().phase
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.state().owner.clone()
    }

    /// 直近の取得失敗メッセージ
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// 所有者を切り替える
    ///
    /// 変化がなければ何もしない。所有者なしなら空の一覧でReadyになる。
    pub fn set_owner(&self, owner: Option<OwnerId>) -> bool {
        let mut st = self.state();
        if st.owner == owner {
            return false;
        }

        st.generation += 1;
        st.phase = if owner.is_some() {
            HistoryPhase::Loading
        } else {
            HistoryPhase::Ready
        };
        tracing::debug!(owner = ?owner, generation = st.generation, "履歴の所有者を変更");
        st.owner = owner;
        st.records.clear();
        st.reset_sync_marks();
        st.last_error = None;
        true
    }

    /// 現在の所有者の履歴を取得し直す
    ///
    /// 結果を反映したらtrue。所有者なし、または取得中に所有者が
    /// 変わった（あるいは新しい取得が始まった）場合はfalse。
    pub async fn refresh(&self) -> Result<bool> {
        let (owner, generation, seq) = {
            let mut st = self.state();
            let Some(owner) = st.owner.clone() else {
                return Ok(false);
            };
            st.fetch_seq += 1;
            st.phase = HistoryPhase::Loading;
            st.reset_sync_marks();
            (owner, st.generation, st.fetch_seq)
        };

        let result = bounded(self.timeout, self.store.query(&owner), |d| {
            ReceiptQrError::Persistence(format!("履歴の取得がタイムアウトしました（{}秒）", d.as_secs()))
        })
        .await;

        let mut st = self.state();
        if st.generation != generation || st.fetch_seq != seq {
            tracing::warn!(owner = %owner, "古い取得結果を破棄");
            return Ok(false);
        }

        match result {
            Ok(fetched) => {
                let fetched_ids: HashSet<&str> = fetched.iter().map(|r| r.id.as_str()).collect();
                let mut merged: Vec<HistoryRecord> = st
                    .appended_since_fetch
                    .iter()
                    .filter(|r| !fetched_ids.contains(r.id.as_str()))
                    .cloned()
                    .collect();
                merged.extend(
                    fetched
                        .iter()
                        .filter(|r| !st.deleted_since_fetch.contains(&r.id))
                        .cloned(),
                );
                sort_newest_first(&mut merged);

                tracing::info!(owner = %owner, count = merged.len(), "履歴を取得");
                st.records = merged;
                st.phase = HistoryPhase::Ready;
                st.last_error = None;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(owner = %owner, error = %err, "履歴の取得に失敗");
                st.phase = HistoryPhase::Ready;
                st.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// 現在の所有者の履歴に追加
    pub async fn append(&self, receipt_image_uri: &str, extracted_text: &str) -> Result<HistoryRecord> {
        let owner = self.owner().ok_or(ReceiptQrError::NotAuthenticated)?;
        self.append_for(&owner, receipt_image_uri, extracted_text).await
    }

    /// 指定した所有者の履歴に追加
    ///
    /// 呼び出し時点の所有者が `owner` でなければ書き込まずに
    /// `OwnerChanged` を返す（所有者なしなら `NotAuthenticated`）。
    /// 書き込み成功後に一覧の先頭へ追加する。書き込み中に所有者が
    /// 変わった場合、レコードは返すが一覧には反映しない。
    pub async fn append_for(
        &self,
        owner: &OwnerId,
        receipt_image_uri: &str,
        extracted_text: &str,
    ) -> Result<HistoryRecord> {
        let generation = {
            let st = self.state();
            match &st.owner {
                None => return Err(ReceiptQrError::NotAuthenticated),
                Some(current) if current != owner => {
                    tracing::warn!(owner = %owner, current = %current, "所有者が変わったため追加しない");
                    return Err(ReceiptQrError::OwnerChanged(owner.clone()));
                }
                Some(_) => st.generation,
            }
        };
        let owner = owner.clone();

        let new_record = NewHistoryRecord {
            owner_id: Some(owner.clone()),
            receipt_image_uri: receipt_image_uri.to_string(),
            extracted_text: extracted_text.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let id = bounded(self.timeout, self.store.insert(&new_record), |d| {
            ReceiptQrError::Persistence(format!("履歴の保存がタイムアウトしました（{}秒）", d.as_secs()))
        })
        .await?;
        let record = new_record.with_id(id);

        let mut st = self.state();
        if st.generation != generation {
            tracing::warn!(owner = %owner, id = %record.id, "所有者が変わったため追加結果を一覧に反映しない");
            return Ok(record);
        }
        st.records.insert(0, record.clone());
        st.appended_since_fetch.push(record.clone());
        tracing::info!(owner = %owner, id = %record.id, "履歴を追加");
        Ok(record)
    }

    /// 現在の所有者の履歴をすべて削除
    ///
    /// 所有者なし、または一覧が空（取得済み）なら何もしない。
    /// 一部のIDが削除できなかった場合、それらは一覧に残り
    /// `ClearIncomplete` を返す。
    pub async fn clear(&self) -> Result<()> {
        let (owner, generation, local_ids) = {
            let st = self.state();
            let Some(owner) = st.owner.clone() else {
                return Ok(());
            };
            if st.phase == HistoryPhase::Ready && st.records.is_empty() {
                tracing::debug!(owner = %owner, "履歴は空のため削除しない");
                return Ok(());
            }
            let local_ids: Vec<String> = st.records.iter().map(|r| r.id.clone()).collect();
            (owner, st.generation, local_ids)
        };

        let remote = bounded(self.timeout, self.store.query(&owner), |d| {
            ReceiptQrError::Persistence(format!("履歴の取得がタイムアウトしました（{}秒）", d.as_secs()))
        })
        .await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = remote
            .into_iter()
            .map(|r| r.id)
            .chain(local_ids)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let outcome = bounded(self.timeout, self.store.delete_batch(&ids), |d| {
            ReceiptQrError::Persistence(format!("履歴の削除がタイムアウトしました（{}秒）", d.as_secs()))
        })
        .await?;

        {
            let mut st = self.state();
            if st.generation == generation {
                let deleted: HashSet<&str> = outcome.deleted.iter().map(String::as_str).collect();
                st.records.retain(|r| !deleted.contains(r.id.as_str()));
                st.appended_since_fetch.retain(|r| !deleted.contains(r.id.as_str()));
                st.deleted_since_fetch.extend(outcome.deleted.iter().cloned());
            } else {
                tracing::warn!(owner = %owner, "所有者が変わったため削除結果を一覧に反映しない");
            }
        }

        if outcome.is_complete() {
            tracing::info!(owner = %owner, count = outcome.deleted.len(), "履歴を削除");
            Ok(())
        } else {
            tracing::warn!(owner = %owner, failed = outcome.failed.len(), "履歴の一部を削除できませんでした");
            Err(ReceiptQrError::ClearIncomplete { failed: outcome.failed })
        }
    }
}
