//! 統合テスト用のテストダブル

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use receipt_qr::compositor::{QrEncoder, QrOptions};
use receipt_qr::email::{EmailMessage, Mailer};
use receipt_qr::error::{ReceiptQrError, Result};
use receipt_qr::extractor::{ExtractionResult, Extractor};
use receipt_qr::history::{BatchDeleteOutcome, DocumentStore};
use receipt_qr::session::IdentityProvider;
use receipt_qr_common::{data_uri, sort_newest_first, HistoryRecord, NewHistoryRecord, OwnerId, SessionIdentity};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};

/// 単色PNGのバイト列
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("png encode");
    out
}

pub fn png_data_uri(width: u32, height: u32) -> String {
    data_uri::encode("image/png", &png_bytes(width, height))
}

/// 取得を途中で止めるためのゲート
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

/// メモリ上のドキュメントストア
///
/// 取得は呼び出し時点のスナップショットを返す（ゲートがあれば解放まで待つ）。
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    query_gates: Mutex<HashMap<OwnerId, Arc<Gate>>>,
    undeletable: Mutex<HashSet<String>>,
    fail_queries: Mutex<bool>,
    next_id: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 既存データを直接入れる
    pub fn seed(&self, owner: &OwnerId, text: &str, timestamp: i64) -> HistoryRecord {
        let id = format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = HistoryRecord {
            id,
            owner_id: Some(owner.clone()),
            receipt_image_uri: "data:image/png;base64,AA==".into(),
            extracted_text: text.into(),
            timestamp,
        };
        self.records.lock().unwrap().push(record.clone());
        record
    }

    /// 次回以降、この所有者の取得をゲートで止める
    pub fn gate_queries(&self, owner: &OwnerId) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.query_gates.lock().unwrap().insert(owner.clone(), Arc::clone(&gate));
        gate
    }

    pub fn ungate(&self, owner: &OwnerId) {
        self.query_gates.lock().unwrap().remove(owner);
    }

    pub fn refuse_delete(&self, id: &str) {
        self.undeletable.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_queries(&self, fail: bool) {
        *self.fail_queries.lock().unwrap() = fail;
    }

    pub fn stored_for(&self, owner: &OwnerId) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id.as_ref() == Some(owner))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, owner: &OwnerId) -> Result<Vec<HistoryRecord>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_queries.lock().unwrap() {
            return Err(ReceiptQrError::Persistence("query failed".into()));
        }

        let mut snapshot = self.stored_for(owner);
        sort_newest_first(&mut snapshot);

        let gate = self.query_gates.lock().unwrap().get(owner).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn insert(&self, record: &NewHistoryRecord) -> Result<String> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(record.clone().with_id(id.clone()));
        Ok(id)
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<BatchDeleteOutcome> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let undeletable = self.undeletable.lock().unwrap().clone();
        let mut outcome = BatchDeleteOutcome::default();
        let mut records = self.records.lock().unwrap();
        for id in ids {
            if undeletable.contains(id) {
                outcome.failed.push(id.clone());
            } else {
                records.retain(|r| &r.id != id);
                outcome.deleted.push(id.clone());
            }
        }
        Ok(outcome)
    }
}

/// 固定応答の抽出サービス
pub enum StubExtractor {
    Text(String),
    Fail(String),
    Hang,
    /// ゲートが開くまで応答しない
    Gated(Arc<Gate>, String),
}

impl StubExtractor {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(StubExtractor::Text(text.to_string()))
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _image_data_uri: &str) -> Result<ExtractionResult> {
        match self {
            StubExtractor::Text(text) => Ok(ExtractionResult {
                extracted_text: text.clone(),
            }),
            StubExtractor::Fail(message) => Err(ReceiptQrError::Extraction(message.clone())),
            StubExtractor::Hang => std::future::pending().await,
            StubExtractor::Gated(gate, text) => {
                gate.entered.notify_one();
                gate.release.notified().await;
                Ok(ExtractionResult {
                    extracted_text: text.clone(),
                })
            }
        }
    }
}

/// 受け取ったペイロードを記録するQRエンコーダ
///
/// 要求サイズの正方形を dark 色で塗りつぶす。
#[derive(Default)]
pub struct RecordingEncoder {
    pub payloads: Mutex<Vec<String>>,
}

impl QrEncoder for RecordingEncoder {
    fn encode(&self, text: &str, options: &QrOptions) -> Result<RgbaImage> {
        self.payloads.lock().unwrap().push(text.to_string());
        Ok(RgbaImage::from_pixel(options.size, options.size, Rgba(options.dark)))
    }
}

/// 送信内容を記録するメーラ
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// 手動操作できるIDプロバイダ
pub struct StubIdentityProvider {
    sender: watch::Sender<SessionIdentity>,
    fail_sign_in: Mutex<bool>,
    interactive_gate: Mutex<Option<Arc<Gate>>>,
    pub anonymous_calls: AtomicUsize,
}

impl StubIdentityProvider {
    pub fn new(initial: SessionIdentity) -> Arc<Self> {
        let (sender, _) = watch::channel(initial);
        Arc::new(Self {
            sender,
            fail_sign_in: Mutex::new(false),
            interactive_gate: Mutex::new(None),
            anonymous_calls: AtomicUsize::new(0),
        })
    }

    /// プロバイダ側でセッションが変わったことを通知
    pub fn push(&self, identity: SessionIdentity) {
        self.sender.send_replace(identity);
    }

    pub fn fail_sign_in(&self, fail: bool) {
        *self.fail_sign_in.lock().unwrap() = fail;
    }

    /// 次回以降の対話ログインをゲートで止める
    pub fn gate_interactive(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.interactive_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn current(&self) -> SessionIdentity {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionIdentity> {
        self.sender.subscribe()
    }

    async fn sign_in_interactive(&self) -> Result<SessionIdentity> {
        let gate = self.interactive_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if *self.fail_sign_in.lock().unwrap() {
            return Err(ReceiptQrError::Auth("popup closed".into()));
        }
        let identity = SessionIdentity::Authenticated(OwnerId::new("user-1"));
        self.push(identity.clone());
        Ok(identity)
    }

    async fn sign_in_anonymous(&self) -> Result<SessionIdentity> {
        let n = self.anonymous_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_sign_in.lock().unwrap() {
            return Err(ReceiptQrError::Auth("anonymous sign-in disabled".into()));
        }
        let identity = SessionIdentity::Anonymous(OwnerId::new(format!("anon-{}", n)));
        self.push(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.push(SessionIdentity::Unauthenticated);
        Ok(())
    }
}
