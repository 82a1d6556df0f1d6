pub mod cli;
pub mod compositor;
pub mod config;
pub mod context;
pub mod email;
pub mod error;
pub mod extractor;
pub mod history;
pub mod intake;
pub mod pipeline;
pub mod session;

pub(crate) mod bounded;

pub use error::{ReceiptQrError, Result};
