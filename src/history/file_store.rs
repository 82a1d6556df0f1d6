//! JSONファイルによるドキュメントストア
//!
//! データディレクトリの history.json に全所有者の履歴を保存する。
//! 書き込みは一時ファイル経由で置き換える。

use super::store::{BatchDeleteOutcome, DocumentStore};
use crate::error::{ReceiptQrError, Result};
use async_trait::async_trait;
use receipt_qr_common::{sort_newest_first, HistoryRecord, NewHistoryRecord, OwnerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STORE_FILE_NAME: &str = "history.json";

/// ストアファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    /// バージョン（互換性チェック用）
    version: u32,
    documents: Vec<HistoryRecord>,
}

impl StoreFile {
    const CURRENT_VERSION: u32 = 1;
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            documents: Vec::new(),
        }
    }
}

/// JSONファイルストア
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// ディレクトリを指定して開く（ファイルは最初の書き込みで作成）
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(STORE_FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }

        let file = File::open(&self.path)?;
        let store: StoreFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ReceiptQrError::Persistence(format!("{} が破損しています: {}", self.path.display(), e)))?;

        if store.version != StoreFile::CURRENT_VERSION {
            return Err(ReceiptQrError::Persistence(format!(
                "未対応のストアバージョン: {}",
                store.version
            )));
        }
        Ok(store)
    }

    fn save(&self, store: &StoreFile) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, store)?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ReceiptQrError::Persistence("ストアのロックが壊れています".into()))?;
        f()
    }
}

fn persistence(context: &str, err: ReceiptQrError) -> ReceiptQrError {
    match err {
        ReceiptQrError::Persistence(_) => err,
        other => ReceiptQrError::Persistence(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn query(&self, owner: &OwnerId) -> Result<Vec<HistoryRecord>> {
        self.with_lock(|| {
            let store = self.load()?;
            let mut records: Vec<HistoryRecord> = store
                .documents
                .into_iter()
                .filter(|doc| doc.owner_id.as_ref() == Some(owner))
                .collect();
            // ファイル内は追加順なので、逆順にしてから安定ソート
            records.reverse();
            sort_newest_first(&mut records);
            Ok(records)
        })
        .map_err(|e| persistence("履歴の読み込み", e))
    }

    async fn insert(&self, record: &NewHistoryRecord) -> Result<String> {
        self.with_lock(|| {
            let mut store = self.load()?;
            let id = uuid::Uuid::new_v4().to_string();
            store.documents.push(record.clone().with_id(id.clone()));
            self.save(&store)?;
            Ok(id)
        })
        .map_err(|e| persistence("履歴の保存", e))
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<BatchDeleteOutcome> {
        if ids.is_empty() {
            return Ok(BatchDeleteOutcome::default());
        }

        self.with_lock(|| {
            let mut store = self.load()?;
            let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
            store.documents.retain(|doc| !targets.contains(doc.id.as_str()));
            // 1ファイルへの書き込みなので全件成功か全件失敗
            self.save(&store)?;
            Ok(BatchDeleteOutcome::all_deleted(ids))
        })
        .map_err(|e| persistence("履歴の削除", e))
    }
}
