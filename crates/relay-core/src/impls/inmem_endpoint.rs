//! InMemoryEndpoint - テスト・デモ用の双方向エンドポイント
//!
//! # 実装詳細
//! - `listen` は handler を保持するだけ
//! - `send` は結果を Vec に積む、`ack` は `!is_nack` を Vec に積む
//! - `push` が保持した handler を直接呼んで配送をシミュレートする
//!
//! tokio の Mutex は await を跨がないように、handler を clone してからロックを外す。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{DeliveryToken, Disposition, EndpointError, Message, WorkerError};
use crate::ports::{Endpoint, MessageHandler};

/// InMemoryEndpoint はトランスポートなしで Worker を検証するための Endpoint
///
/// # 使用例
/// ```ignore
/// let channel = Arc::new(InMemoryEndpoint::new());
/// let worker = Worker::new(channel.clone(), work_fn(|p| WorkResult::ok(p.clone())));
/// worker.start().await?;
///
/// channel.push(json!("TEST")).await?;
/// assert_eq!(channel.pull().await, vec![json!("TEST")]);
/// assert_eq!(channel.acks().await, vec![true]);
/// ```
pub struct InMemoryEndpoint {
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
    /// send された結果（送信順）
    results: Mutex<Vec<Message>>,
    /// ack の記録（true = ack, false = nack）
    acks: Mutex<Vec<bool>>,
}

impl InMemoryEndpoint {
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
            results: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
        }
    }

    /// 登録済みの handler にペイロードを配送する（token は `None`）
    pub async fn push(&self, payload: Message) -> Result<Disposition, WorkerError> {
        let handler = self
            .handler
            .lock()
            .await
            .clone()
            .ok_or(EndpointError::NoListener)?;
        handler.handle(None, payload).await
    }

    /// これまでに send された結果
    pub async fn pull(&self) -> Vec<Message> {
        self.results.lock().await.clone()
    }

    pub async fn acks(&self) -> Vec<bool> {
        self.acks.lock().await.clone()
    }

    pub async fn is_listening(&self) -> bool {
        self.handler.lock().await.is_some()
    }
}

impl Default for InMemoryEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Endpoint for InMemoryEndpoint {
    async fn listen(&self, handler: Arc<dyn MessageHandler>) -> Result<(), EndpointError> {
        *self.handler.lock().await = Some(handler);
        Ok(())
    }

    async fn send(&self, payload: Message) -> Result<(), EndpointError> {
        self.results.lock().await.push(payload);
        Ok(())
    }

    async fn ack(&self, token: Option<DeliveryToken>, is_nack: bool) -> Result<(), EndpointError> {
        debug!(?token, is_nack, "recording acknowledgement");
        self.acks.lock().await.push(!is_nack);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
