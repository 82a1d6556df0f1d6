//! 履歴・セッションの型定義
//!
//! CLIとストア実装で共有される型:
//! - OwnerId: 履歴の所有者（セッションID）
//! - HistoryRecord: 永続化されたスキャン履歴
//! - NewHistoryRecord: ストアへ書き込む前の履歴（IDはストアが採番）
//! - SessionIdentity: 現在のセッション

use serde::{Deserialize, Serialize};
use std::fmt;

/// 履歴の所有者ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// スキャン履歴
///
/// 作成後は変更されない。削除のみ可能。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// ストアが採番したID
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,

    /// レシート画像（Data URI）
    pub receipt_image_uri: String,

    /// 抽出テキスト（QRコードの内容・メール本文）
    pub extracted_text: String,

    /// 作成日時（エポックミリ秒）
    pub timestamp: i64,
}

/// 採番前の履歴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
    pub receipt_image_uri: String,
    pub extracted_text: String,
    pub timestamp: i64,
}

impl NewHistoryRecord {
    /// ストアが採番したIDで確定する
    pub fn with_id(self, id: impl Into<String>) -> HistoryRecord {
        HistoryRecord {
            id: id.into(),
            owner_id: self.owner_id,
            receipt_image_uri: self.receipt_image_uri,
            extracted_text: self.extracted_text,
            timestamp: self.timestamp,
        }
    }
}

/// 新しい順（timestamp降順）に並べる
///
/// 同一timestampでは元の並び順を維持する。
pub fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// セッションの状態
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum SessionIdentity {
    #[default]
    Unauthenticated,
    Anonymous(OwnerId),
    Authenticated(OwnerId),
}

impl SessionIdentity {
    /// 履歴の所有者ID（未ログインならNone）
    pub fn owner_id(&self) -> Option<&OwnerId> {
        match self {
            SessionIdentity::Unauthenticated => None,
            SessionIdentity::Anonymous(id) | SessionIdentity::Authenticated(id) => Some(id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, SessionIdentity::Anonymous(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionIdentity::Unauthenticated => "未ログイン",
            SessionIdentity::Anonymous(_) => "匿名セッション",
            SessionIdentity::Authenticated(_) => "ログイン済み",
        }
    }
}
