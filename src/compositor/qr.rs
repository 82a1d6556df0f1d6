//! QRコード生成
//!
//! qrcodeクレートのモジュール配列を自前でラスタライズする。
//! 余白（モジュール数）と色を指定でき、同じ入力なら常に同じ画素になる。

use crate::error::{ReceiptQrError, Result};
use image::{Rgba, RgbaImage};
use qrcode::{Color, QrCode};

/// QRコード描画オプション
#[derive(Debug, Clone, PartialEq)]
pub struct QrOptions {
    /// 要求する一辺（px）。モジュール単位に切り捨てる
    pub size: u32,
    pub margin_modules: u32,
    pub dark: [u8; 4],
    pub light: [u8; 4],
}

/// QRコードエンコーダ
pub trait QrEncoder: Send + Sync {
    fn encode(&self, text: &str, options: &QrOptions) -> Result<RgbaImage>;
}

/// qrcodeクレートによる実装
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, text: &str, options: &QrOptions) -> Result<RgbaImage> {
        let code = QrCode::new(text.as_bytes())
            .map_err(|e| ReceiptQrError::Render(format!("QRコード生成失敗: {}", e)))?;

        let modules = code.width() as u32;
        let total = modules + options.margin_modules * 2;
        let module_px = (options.size / total).max(1);
        let edge = module_px * total;

        let mut img = RgbaImage::from_pixel(edge, edge, Rgba(options.light));
        let dark = Rgba(options.dark);

        for (index, color) in code.to_colors().iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let col = index as u32 % modules;
            let row = index as u32 / modules;
            let x0 = (col + options.margin_modules) * module_px;
            let y0 = (row + options.margin_modules) * module_px;
            for y in y0..y0 + module_px {
                for x in x0..x0 + module_px {
                    img.put_pixel(x, y, dark);
                }
            }
        }

        Ok(img)
    }
}
