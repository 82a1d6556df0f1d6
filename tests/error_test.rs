//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use receipt_qr::error::{NotificationLevel, ReceiptQrError};
use receipt_qr::history::JsonFileStore;
use receipt_qr::history::DocumentStore;
use receipt_qr::intake::{self, ImageSource};
use receipt_qr_common::OwnerId;
use std::path::PathBuf;
use tempfile::tempdir;

/// 存在しない画像ファイル
#[test]
fn test_read_nonexistent_image() {
    let result = intake::read_as_data_uri(&ImageSource::Path(PathBuf::from("/nonexistent/path/12345.png")));
    assert!(result.is_err());

    let err = result.unwrap_err();
    assert!(matches!(err, ReceiptQrError::Read(_)));
}

/// 画像でないファイル
#[test]
fn test_read_text_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("receipt.png");
    std::fs::write(&path, "hello").unwrap();

    let err = intake::read_as_data_uri(&ImageSource::Path(path)).unwrap_err();
    assert!(matches!(err, ReceiptQrError::Read(_)));
}

/// 壊れた履歴ファイルは永続化エラー
#[tokio::test]
async fn test_corrupted_store_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("history.json"), "{ not json").unwrap();

    let store = JsonFileStore::open(dir.path()).unwrap();
    let err = store.query(&OwnerId::new("a")).await.unwrap_err();
    assert!(err.is_persistence());
}

/// ReceiptQrErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ReceiptQrError::Config("テスト設定エラー".to_string()),
        ReceiptQrError::Read("test.jpg".to_string()),
        ReceiptQrError::Extraction("API呼び出し失敗".to_string()),
        ReceiptQrError::NoTextFound,
        ReceiptQrError::Render("QR生成失敗".to_string()),
        ReceiptQrError::Persistence("書き込み失敗".to_string()),
        ReceiptQrError::ClearIncomplete { failed: vec!["a".into(), "b".into()] },
        ReceiptQrError::Auth("popup closed".to_string()),
        ReceiptQrError::NotAuthenticated,
        ReceiptQrError::OwnerChanged(OwnerId::new("a")),
        ReceiptQrError::Email("送信失敗".to_string()),
        ReceiptQrError::RecordNotFound("abc".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingApiKeyエラーのメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let err = ReceiptQrError::MissingApiKey("Gemini");
    let display = format!("{}", err);

    assert!(display.contains("APIキー"));
    assert!(display.contains("receipt-qr config"));
}

/// 一部削除失敗のメッセージに件数とIDが入る
#[test]
fn test_clear_incomplete_message() {
    let err = ReceiptQrError::ClearIncomplete { failed: vec!["doc-1".into(), "doc-2".into()] };
    let display = format!("{}", err);

    assert!(display.contains("2件"));
    assert!(display.contains("doc-1, doc-2"));
}

/// 通知への変換
#[test]
fn test_notification() {
    let notification = ReceiptQrError::NoTextFound.notification();
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.title, "レシートを処理できません");
    assert!(notification.to_string().starts_with("✘ "));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: ReceiptQrError = io_err.into();

    assert!(matches!(err, ReceiptQrError::Io(_)));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
    let err: ReceiptQrError = json_err.into();

    assert!(matches!(err, ReceiptQrError::JsonParse(_)));
}

/// 共通ライブラリのエラーはそのまま表示される
#[test]
fn test_common_error_conversion() {
    let common_err = receipt_qr_common::DataUri::parse("plain text").unwrap_err();
    let message = common_err.to_string();
    let err: ReceiptQrError = common_err.into();

    assert!(matches!(err, ReceiptQrError::Common(_)));
    assert_eq!(err.to_string(), message);
}
