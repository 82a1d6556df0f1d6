//! 外部呼び出しのタイムアウト

use crate::error::{ReceiptQrError, Result};
use std::future::Future;
use std::time::Duration;

/// 外部呼び出しを1回だけタイムアウト付きで待つ
///
/// タイムアウト時は `on_timeout` のエラーを返す。
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce(Duration) -> ReceiptQrError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
