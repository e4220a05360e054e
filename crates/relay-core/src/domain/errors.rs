//! Errors - エラー型と分類
//!
//! - `EndpointError`: トランスポート側の失敗（送信・ack・購読）
//! - `WorkerError`: `process` から呼び出し元へ伝播する失敗
//!
//! 上流エラー・検証エラー・work の失敗はここには含まれません。
//! それらは `Disposition` として正常系で表現されます。

use std::time::Duration;

use thiserror::Error;

/// 協調者（work / payload check / transport）が返す任意のエラー
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("no handler is listening on this endpoint")]
    NoListener,

    #[error("endpoint is already listening")]
    AlreadyListening,

    #[error("consumer was cancelled or its stream ended")]
    ConsumerCancelled,

    #[error("a delivery token is required to {action}")]
    MissingToken { action: &'static str },

    #[error("payload codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("transport: {0}")]
    Transport(#[source] BoxError),
}

impl EndpointError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// `process` が処理を中断して返すエラー
///
/// リトライはしません。ack / send はエラー発生以降は一切行われません。
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("work hook failed: {0}")]
    Work(#[source] BoxError),

    #[error("payload check failed: {0}")]
    PayloadCheck(#[source] BoxError),
}
