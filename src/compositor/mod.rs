//! レシート＋QRコード合成モジュール
//!
//! レシート画像（Data URI）と抽出テキストから、
//! 左にレシート、右にQRコードを並べたPNGを生成する。
//! 合成画像は保存せず、必要になるたびに再生成する。

pub mod qr;

pub use qr::{QrCodeEncoder, QrEncoder, QrOptions};

use crate::error::{ReceiptQrError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use receipt_qr_common::{compute_layout, data_uri, CanvasLayout, DataUri, LayoutConfig};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// 合成結果（PNG）
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    pub layout: CanvasLayout,
    pub png: Vec<u8>,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn to_data_uri(&self) -> String {
        data_uri::encode("image/png", &self.png)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

/// 画像合成器
#[derive(Clone)]
pub struct ImageCompositor {
    layout: LayoutConfig,
    encoder: Arc<dyn QrEncoder>,
}

impl Default for ImageCompositor {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl ImageCompositor {
    pub fn new(layout: LayoutConfig) -> Self {
        Self::with_encoder(layout, Arc::new(QrCodeEncoder))
    }

    pub fn with_encoder(layout: LayoutConfig, encoder: Arc<dyn QrEncoder>) -> Self {
        Self { layout, encoder }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// レシートとQRコードを合成
    pub fn compose(&self, receipt_image_uri: &str, qr_payload: &str) -> Result<CompositeImage> {
        // 1. レシートをデコード
        let receipt = decode_receipt(receipt_image_uri)?;
        let (fit_w, fit_h) = self.layout.fit_receipt(receipt.width(), receipt.height());
        let receipt = if (fit_w, fit_h) != (receipt.width(), receipt.height()) {
            tracing::debug!(
                from = ?(receipt.width(), receipt.height()),
                to = ?(fit_w, fit_h),
                "レシートを縮小"
            );
            receipt.resize_exact(fit_w, fit_h, FilterType::Triangle).to_rgba8()
        } else {
            receipt.to_rgba8()
        };

        // 2. QRコードを生成
        let qr = self.encoder.encode(qr_payload, &self.qr_options(receipt.height()))?;

        // 3. 配置を計算して描画
        let layout = compute_layout(
            &self.layout,
            (receipt.width(), receipt.height()),
            (qr.width(), qr.height()),
        );
        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, Rgba(self.layout.background));
        imageops::overlay(&mut canvas, &receipt, layout.receipt.x as i64, layout.receipt.y as i64);
        imageops::overlay(&mut canvas, &qr, layout.qr.x as i64, layout.qr.y as i64);

        // 4. PNGにエンコード
        let png = encode_png(canvas)?;
        tracing::debug!(width = layout.width, height = layout.height, bytes = png.len(), "合成完了");

        Ok(CompositeImage { layout, png })
    }

    /// QRコード単体のPNG（レシート高さ基準のサイズ）
    pub fn render_qr_png(&self, qr_payload: &str, size: u32) -> Result<Vec<u8>> {
        let qr = self.encoder.encode(
            qr_payload,
            &QrOptions {
                size,
                ..self.qr_options(0)
            },
        )?;
        encode_png(qr)
    }

    fn qr_options(&self, receipt_height: u32) -> QrOptions {
        QrOptions {
            size: self.layout.qr_target_size(receipt_height),
            margin_modules: self.layout.qr_margin_modules,
            dark: self.layout.qr_dark,
            light: self.layout.qr_light,
        }
    }
}

fn decode_receipt(receipt_image_uri: &str) -> Result<DynamicImage> {
    let uri = DataUri::parse(receipt_image_uri)
        .map_err(|e| ReceiptQrError::Render(format!("レシート画像のData URIが不正: {}", e)))?;
    image::load_from_memory(&uri.bytes)
        .map_err(|e| ReceiptQrError::Render(format!("レシート画像をデコードできません: {}", e)))
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ReceiptQrError::Render(format!("PNGエンコード失敗: {}", e)))?;
    Ok(png)
}
