//! アップロードパイプライン
//!
//! 画像取り込み → テキスト抽出 → 合成 → 履歴保存 を順に実行する。
//!
//! 状態遷移:
//! - Idle → Extracting → Composing → Saved
//! - どの段階で失敗しても Failed を経て Idle に戻る（通知以外の表示状態はクリア）
//! - Saved からは次の実行または reset() で Idle に戻る
//!
//! `run` は `&mut self` を取るため、同じパイプラインで
//! 2つのアップロードが重なることはない。

use crate::bounded::bounded;
use crate::compositor::{CompositeImage, ImageCompositor};
use crate::email::{EmailMessage, Mailer};
use crate::error::{Notification, ReceiptQrError, Result};
use crate::extractor::Extractor;
use crate::history::HistoryStore;
use crate::intake::{self, ImageSource};
use receipt_qr_common::HistoryRecord;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Extracting,
    Composing,
    Saved,
    Failed,
}

/// 表示用の状態
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub stage: PipelineStage,
    pub receipt_image: Option<String>,
    pub extracted_text: Option<String>,
    pub composite: Option<CompositeImage>,
    pub notification: Option<Notification>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Idle,
            receipt_image: None,
            extracted_text: None,
            composite: None,
            notification: None,
        }
    }
}

/// 1回の実行結果
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub record: HistoryRecord,
    pub composite: CompositeImage,
}

/// 段階が変わるたびに呼ばれる
pub type StageObserver = Box<dyn Fn(PipelineStage) + Send + Sync>;

pub struct UploadPipeline {
    extractor: Arc<dyn Extractor>,
    compositor: ImageCompositor,
    history: Arc<HistoryStore>,
    timeout: Duration,
    state: PipelineState,
    observer: Option<StageObserver>,
}

impl UploadPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        compositor: ImageCompositor,
        history: Arc<HistoryStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            compositor,
            history,
            timeout,
            state: PipelineState::default(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stage(&self) -> PipelineStage {
        self.state.stage
    }

    /// 表示状態をクリアしてIdleに戻す
    pub fn reset(&mut self) {
        self.state = PipelineState::default();
        self.enter(PipelineStage::Idle);
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(?stage, "パイプライン段階");
        self.state.stage = stage;
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    /// 画像を処理する
    ///
    /// 失敗時はFailedを通知してからIdleに戻り、通知を残してエラーを返す。
    /// 自動リトライはしない。
    pub async fn run(&mut self, source: ImageSource) -> Result<ScanOutcome> {
        if self.state.stage != PipelineStage::Idle {
            self.reset();
        } else {
            self.state = PipelineState::default();
        }

        match self.run_stages(&source).await {
            Ok(outcome) => {
                self.state.notification = Some(Notification::success(
                    "完了",
                    "レシートを処理して履歴に保存しました",
                ));
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(error = %err, "パイプライン失敗");
                self.state.receipt_image = None;
                self.state.extracted_text = None;
                self.state.composite = None;
                self.state.notification = Some(err.notification());
                self.enter(PipelineStage::Failed);
                self.enter(PipelineStage::Idle);
                Err(err)
            }
        }
    }

    async fn run_stages(&mut self, source: &ImageSource) -> Result<ScanOutcome> {
        // 開始時の所有者に保存する
        let owner = self.history.owner().ok_or(ReceiptQrError::NotAuthenticated)?;

        // 1. 取り込み＋抽出
        self.enter(PipelineStage::Extracting);
        let receipt_uri = intake::read_as_data_uri(source)?;
        self.state.receipt_image = Some(receipt_uri.clone());

        let result = bounded(self.timeout, self.extractor.extract(&receipt_uri), |d| {
            ReceiptQrError::Extraction(format!("抽出がタイムアウトしました（{}秒）", d.as_secs()))
        })
        .await
        .map_err(|err| match err {
            ReceiptQrError::Extraction(_) | ReceiptQrError::NoTextFound => err,
            other => ReceiptQrError::Extraction(other.to_string()),
        })?;

        if result.text().is_none() {
            return Err(ReceiptQrError::NoTextFound);
        }
        let text = result.extracted_text;
        self.state.extracted_text = Some(text.clone());

        // 2. 合成（QRの内容は抽出テキストそのもの）
        self.enter(PipelineStage::Composing);
        let composite = self.compositor.compose(&receipt_uri, &text)?;
        self.state.composite = Some(composite.clone());

        // 3. 履歴保存（合成画像は保存しない）
        let record = self.history.append_for(&owner, &receipt_uri, &text).await?;
        self.enter(PipelineStage::Saved);

        Ok(ScanOutcome { record, composite })
    }

    /// 現在の結果をメールで送る
    ///
    /// 合成画像は送信時に作り直す。
    pub async fn email_result(&self, mailer: &dyn Mailer, to: &str) -> Result<()> {
        let (Some(receipt), Some(text)) = (&self.state.receipt_image, &self.state.extracted_text) else {
            return Err(ReceiptQrError::Email("送信できる結果がありません".into()));
        };
        send_receipt_email(&self.compositor, mailer, self.timeout, receipt, text, to).await
    }
}

/// 保存済みの項目から合成し直してメール送信
pub async fn send_receipt_email(
    compositor: &ImageCompositor,
    mailer: &dyn Mailer,
    timeout: Duration,
    receipt_image_uri: &str,
    extracted_text: &str,
    to: &str,
) -> Result<()> {
    let composite = compositor.compose(receipt_image_uri, extracted_text)?;
    let message = EmailMessage::for_receipt(to, extracted_text, &composite)?;
    bounded(timeout, mailer.send(&message), |d| {
        ReceiptQrError::Email(format!("送信がタイムアウトしました（{}秒）", d.as_secs()))
    })
    .await
}
