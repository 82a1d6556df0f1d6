//! 合成画像のレイアウト計算
//!
//! レシートを左、QRコードを右に並べた1枚の画像を作るための座標計算。
//! 画像ライブラリに依存しない純粋な算術のみを置く。

// ============================================
// px基準レイアウト（Source of Truth）
// ============================================

/// QRコードの一辺 = レシート高さ × この比率
pub const QR_SIZE_RATIO: f32 = 0.5;

/// キャンバス外周の余白（px）
pub const PADDING_PX: u32 = 30;

/// レシートとQRコードの間隔（px）
pub const SPACING_PX: u32 = 20;

/// QRコード周囲の余白（モジュール数）
pub const QR_MARGIN_MODULES: u32 = 1;

/// 背景色（白）
pub const BACKGROUND_RGBA: [u8; 4] = [255, 255, 255, 255];

/// QRコードの暗色（黒）
pub const QR_DARK_RGBA: [u8; 4] = [0, 0, 0, 255];

/// QRコードの明色（白）
pub const QR_LIGHT_RGBA: [u8; 4] = [255, 255, 255, 255];

// ============================================
// レイアウト設定構造体
// ============================================

/// 合成レイアウト設定
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// QRコードサイズ比率（レシート高さに対する）
    pub qr_size_ratio: f32,
    /// 外周余白（px）
    pub padding: u32,
    /// レシートとQRコードの間隔（px）
    pub spacing: u32,
    /// QR余白（モジュール数）
    pub qr_margin_modules: u32,
    pub background: [u8; 4],
    pub qr_dark: [u8; 4],
    pub qr_light: [u8; 4],
    /// レシートの長辺上限（px）。超える場合は縮小してから配置する
    pub max_receipt_edge: Option<u32>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            qr_size_ratio: QR_SIZE_RATIO,
            padding: PADDING_PX,
            spacing: SPACING_PX,
            qr_margin_modules: QR_MARGIN_MODULES,
            background: BACKGROUND_RGBA,
            qr_dark: QR_DARK_RGBA,
            qr_light: QR_LIGHT_RGBA,
            max_receipt_edge: None,
        }
    }
}

impl LayoutConfig {
    /// レシート高さから要求するQRコードの一辺（px、最低1）
    pub fn qr_target_size(&self, receipt_height: u32) -> u32 {
        ((receipt_height as f32 * self.qr_size_ratio).round() as u32).max(1)
    }

    /// 長辺上限を適用したレシートサイズ
    ///
    /// 上限以内ならそのまま返す。縮小時は縦横比を維持し、各辺最低1px。
    pub fn fit_receipt(&self, width: u32, height: u32) -> (u32, u32) {
        let Some(max_edge) = self.max_receipt_edge else {
            return (width, height);
        };
        let long_edge = width.max(height);
        if long_edge <= max_edge || long_edge == 0 {
            return (width, height);
        }
        let scale = max_edge as f64 / long_edge as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }
}

// ============================================
// 計算結果
// ============================================

/// キャンバス上の矩形（px）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// 2つの矩形が重なるか（辺が接するだけなら重ならない）
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// canvas_width × canvas_height の内側に余白付きで収まるか
    pub fn is_inside_with_margin(&self, canvas_width: u32, canvas_height: u32) -> bool {
        self.x > 0 && self.y > 0 && self.right() < canvas_width && self.bottom() < canvas_height
    }
}

/// 合成キャンバスの配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub receipt: Rect,
    pub qr: Rect,
}

/// レシートとQRコードの実寸から配置を計算
///
/// - レシートは (padding, padding) に配置
/// - QRコードはレシートの右、spacing空けて配置し、縦方向は中央揃え
/// - キャンバス高さは高い方 + 上下padding
pub fn compute_layout(
    config: &LayoutConfig,
    receipt_size: (u32, u32),
    qr_size: (u32, u32),
) -> CanvasLayout {
    let (rw, rh) = receipt_size;
    let (qw, qh) = qr_size;
    let padding = config.padding;
    let content_height = rh.max(qh);

    let receipt = Rect {
        x: padding,
        y: padding,
        width: rw,
        height: rh,
    };
    let qr = Rect {
        x: padding + rw + config.spacing,
        y: padding + (content_height - qh) / 2,
        width: qw,
        height: qh,
    };

    CanvasLayout {
        width: padding + rw + config.spacing + qw + padding,
        height: content_height + padding * 2,
        receipt,
        qr,
    }
}
