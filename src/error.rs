use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptQrError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{0} のAPIキーが設定されていません。`receipt-qr config` で設定してください")]
    MissingApiKey(&'static str),

    #[error("画像読み込みエラー: {0}")]
    Read(String),

    #[error("テキスト抽出エラー: {0}")]
    Extraction(String),

    #[error("レシートからテキストを抽出できませんでした")]
    NoTextFound,

    #[error("画像合成エラー: {0}")]
    Render(String),

    #[error("履歴の保存・取得に失敗: {0}")]
    Persistence(String),

    #[error("履歴の一部を削除できませんでした（{}件）: {}", failed.len(), failed.join(", "))]
    ClearIncomplete { failed: Vec<String> },

    #[error("認証エラー: {0}")]
    Auth(String),

    #[error("ログインしていません。`receipt-qr login` でログインしてください")]
    NotAuthenticated,

    #[error("処理中にログイン状態が変わったため、{0} の履歴には保存しませんでした")]
    OwnerChanged(receipt_qr_common::OwnerId),

    #[error("メール送信エラー: {0}")]
    Email(String),

    #[error("履歴が見つかりません: {0}")]
    RecordNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] receipt_qr_common::Error),
}

impl ReceiptQrError {
    /// 永続化系のエラーか（ClearIncompleteを含む）
    pub fn is_persistence(&self) -> bool {
        matches!(self, ReceiptQrError::Persistence(_) | ReceiptQrError::ClearIncomplete { .. })
    }

    /// ユーザー向け通知に変換
    pub fn notification(&self) -> Notification {
        let title = match self {
            ReceiptQrError::Read(_) => "画像を読み込めません",
            ReceiptQrError::Extraction(_) | ReceiptQrError::NoTextFound => "レシートを処理できません",
            ReceiptQrError::Render(_) => "画像を生成できません",
            ReceiptQrError::Persistence(_) | ReceiptQrError::ClearIncomplete { .. } => "履歴を更新できません",
            ReceiptQrError::Auth(_) | ReceiptQrError::NotAuthenticated => "ログインが必要です",
            ReceiptQrError::OwnerChanged(_) => "ログイン状態が変わりました",
            ReceiptQrError::Email(_) => "メールを送信できません",
            _ => "エラー",
        };
        Notification::error(title, self.to_string())
    }
}

/// ユーザー向け通知（トースト相当）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = match self.level {
            NotificationLevel::Success => "✔",
            NotificationLevel::Error => "✘",
        };
        write!(f, "{} {}: {}", mark, self.title, self.description)
    }
}

pub type Result<T> = std::result::Result<T, ReceiptQrError>;
