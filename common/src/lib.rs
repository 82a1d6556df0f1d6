//! receipt-qr Common Library
//!
//! CLIとストア実装で共有される型とユーティリティ

pub mod types;
pub mod layout;
pub mod data_uri;
pub mod error;

pub use types::{sort_newest_first, HistoryRecord, NewHistoryRecord, OwnerId, SessionIdentity};
pub use layout::{compute_layout, CanvasLayout, LayoutConfig, Rect};
pub use data_uri::DataUri;
pub use error::{Error, Result};
