//! Endpoint port - トランスポートとの境界
//!
//! Endpoint は listen / send / ack の 3 操作だけを提供する薄いシムです。
//! 判断ロジックは一切持たず、すべて Worker が決めます。
//!
//! # 実装
//! - **InMemoryEndpoint**: テスト・デモ用
//! - **AmqpEndpoint**: RabbitMQ（lapin）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DeliveryToken, Disposition, EndpointError, Message, WorkerError};

/// 配送されたメッセージを受け取るコールバック
///
/// Endpoint は 1 メッセージにつき 1 回だけ呼び出します。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        token: Option<DeliveryToken>,
        payload: Message,
    ) -> Result<Disposition, WorkerError>;
}

/// Endpoint は入力の購読・出力の送信・入力の確定を担う
///
/// # 設計原則
/// - 入力と出力が同じ Endpoint でもよい（双方向チャネル）
/// - 配送順序・並行度・永続化はトランスポートが決める
/// - `ack(token, true)` が nack。同じ token に両方を送ることはない
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// handler を登録する。配送のスケジューリングはトランスポート次第。
    async fn listen(&self, handler: Arc<dyn MessageHandler>) -> Result<(), EndpointError>;

    async fn send(&self, payload: Message) -> Result<(), EndpointError>;

    async fn ack(&self, token: Option<DeliveryToken>, is_nack: bool) -> Result<(), EndpointError>;

    /// ログに出すエンドポイント名
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}
