//! AmqpEndpoint - RabbitMQ 上の双方向エンドポイント
//!
//! # 実装詳細
//! - direct exchange を宣言し、キュー名をそのまま routing key としてバインド
//! - `basic_qos(prefetch)`（既定 1）で未 ack のメッセージを 1 件に制限
//! - 送信は JSON + delivery mode 2（永続）、publisher confirm を待つ（broker の nack はエラー）
//! - nack は `basic_nack`。再キューするかは設定次第（dead-letter はブローカー側のポリシー）
//! - 購読タスクは handler の `Err` で止まる。結果は `closed()` で受け取る

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::AmqpConfig;
use crate::domain::{DeliveryToken, EndpointError, Message, WorkerError};
use crate::impls::routing::StaticRouting;
use crate::ports::{Endpoint, MessageHandler, OutputRouting};

const REPLY_SUCCESS: u16 = 200;

impl From<lapin::Error> for EndpointError {
    fn from(err: lapin::Error) -> Self {
        EndpointError::transport(err)
    }
}

/// 永続メッセージとして publish するためのプロパティ
pub(crate) fn publish_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type("application/json".into())
        .with_delivery_mode(2)
}

/// publisher confirm を送信結果に変換する
pub(crate) fn confirmation_result(confirmation: &Confirmation) -> Result<(), EndpointError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(EndpointError::transport("publish nacked by broker")),
        Confirmation::NotRequested => Err(EndpointError::transport(
            "publisher confirms are not enabled on this channel",
        )),
    }
}

/// 購読タスクの終わり方を呼び出し元向けの結果にする
///
/// `close()` による abort は正常終了扱い。
pub(crate) fn consumer_exit(
    joined: Result<Result<(), WorkerError>, JoinError>,
) -> Result<(), WorkerError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(EndpointError::transport(e).into()),
    }
}

/// spawn した購読タスク
struct ConsumerTask {
    abort: AbortHandle,
    /// `closed()` が取り出すまで保持
    join: Option<JoinHandle<Result<(), WorkerError>>>,
}

pub struct AmqpEndpoint {
    connection: Connection,
    channel: Channel,
    exchange: String,
    input_queue: String,
    output_queue: String,
    consumer_tag: String,
    nack_requeue: bool,
    routing: Arc<dyn OutputRouting>,
    consumer: Mutex<Option<ConsumerTask>>,
}

impl AmqpEndpoint {
    /// 接続して exchange と QoS を設定する（routing は StaticRouting）
    pub async fn connect(config: &AmqpConfig) -> Result<Self, EndpointError> {
        Self::connect_with_routing(config, Arc::new(StaticRouting::new())).await
    }

    pub async fn connect_with_routing(
        config: &AmqpConfig,
        routing: Arc<dyn OutputRouting>,
    ) -> Result<Self, EndpointError> {
        let timeout = config.connect_timeout();
        let connection = tokio::time::timeout(
            timeout,
            Connection::connect(&config.url, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| EndpointError::ConnectTimeout(timeout))??;

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;
        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        info!(
            exchange = %config.exchange,
            input = %config.input_queue,
            output = %config.output_queue,
            prefetch = config.prefetch,
            "connected to amqp broker"
        );

        Ok(Self {
            connection,
            channel,
            exchange: config.exchange.clone(),
            input_queue: config.input_queue.clone(),
            output_queue: config.output_queue.clone(),
            consumer_tag: config.consumer_tag.clone(),
            nack_requeue: config.nack_requeue,
            routing,
            consumer: Mutex::new(None),
        })
    }

    /// 永続キューを宣言して exchange にバインドする（routing key = キュー名）
    async fn declare_queue(&self, routing_key: &str) -> Result<(), EndpointError> {
        debug!(routing_key, "creating queue");
        self.channel
            .queue_declare(
                routing_key,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(
                routing_key,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    /// 購読タスクが終わるまで待つ
    ///
    /// handler の `Err`、consumer ストリームの失敗や終了はここで返る。
    /// 購読していない、または結果を受け取り済みなら即座に `Ok(())`。
    pub async fn closed(&self) -> Result<(), WorkerError> {
        let join = self
            .consumer
            .lock()
            .await
            .as_mut()
            .and_then(|task| task.join.take());
        match join {
            Some(join) => consumer_exit(join.await),
            None => Ok(()),
        }
    }

    /// 購読を止めて接続を閉じる
    pub async fn close(&self) -> Result<(), EndpointError> {
        if let Some(consumer) = self.consumer.lock().await.take() {
            consumer.abort.abort();
        }
        self.connection.close(REPLY_SUCCESS, "relay worker shutdown").await?;
        info!("amqp connection closed");
        Ok(())
    }
}

impl fmt::Display for AmqpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.input_queue, self.output_queue)
    }
}

#[async_trait]
impl Endpoint for AmqpEndpoint {
    async fn listen(&self, handler: Arc<dyn MessageHandler>) -> Result<(), EndpointError> {
        let mut slot = self.consumer.lock().await;
        if slot.as_ref().is_some_and(|task| !task.abort.is_finished()) {
            return Err(EndpointError::AlreadyListening);
        }

        self.declare_queue(&self.input_queue).await?;

        let consumer = self
            .channel
            .basic_consume(
                &self.input_queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!(queue = %self.input_queue, "start listening on queue");

        let join = tokio::spawn(consume(
            consumer,
            self.channel.clone(),
            self.consumer_tag.clone(),
            handler,
        ));
        *slot = Some(ConsumerTask {
            abort: join.abort_handle(),
            join: Some(join),
        });
        Ok(())
    }

    async fn send(&self, payload: Message) -> Result<(), EndpointError> {
        let routing_key = self.routing.routing_key(&self.output_queue, &payload);
        self.declare_queue(&routing_key).await?;

        info!(routing_key = %routing_key, "sending");
        let body = serde_json::to_vec(&payload)?;
        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &body,
                publish_properties(),
            )
            .await?
            .await?;
        confirmation_result(&confirmation)?;
        debug!(routing_key = %routing_key, "publish confirmed");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("amqp {self}")
    }

    async fn ack(&self, token: Option<DeliveryToken>, is_nack: bool) -> Result<(), EndpointError> {
        if is_nack {
            let token = token.ok_or(EndpointError::MissingToken { action: "nack" })?;
            let options = BasicNackOptions {
                requeue: self.nack_requeue,
                ..BasicNackOptions::default()
            };
            self.channel.basic_nack(token.tag(), options).await?;
        } else {
            let token = token.ok_or(EndpointError::MissingToken { action: "ack" })?;
            self.channel
                .basic_ack(token.tag(), BasicAckOptions::default())
                .await?;
        }
        Ok(())
    }
}

/// 配送を 1 件ずつ handler に渡す
///
/// prefetch により 1 件ずつ届くので、ここでも逐次処理する。
/// handler が `Err` を返したら購読を取り消してそのエラーで終わる。
/// 未 ack の配送は接続が閉じたときにブローカーが再配送する。
async fn consume(
    mut consumer: Consumer,
    channel: Channel,
    consumer_tag: String,
    handler: Arc<dyn MessageHandler>,
) -> Result<(), WorkerError> {
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery
            .inspect_err(|e| error!(error = %e, "consumer failed"))
            .map_err(EndpointError::from)?;
        let tag = delivery.delivery_tag;

        let payload: Message = match serde_json::from_slice(&delivery.data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tag, error = %e, "undecodable message body, rejecting");
                let options = BasicNackOptions {
                    requeue: false,
                    ..BasicNackOptions::default()
                };
                channel
                    .basic_nack(tag, options)
                    .await
                    .map_err(EndpointError::from)?;
                continue;
            }
        };

        if let Err(e) = handler.handle(Some(DeliveryToken::new(tag)), payload).await {
            error!(tag, error = %e, "message processing failed, stopping consumer");
            if let Err(cancel) = channel
                .basic_cancel(&consumer_tag, BasicCancelOptions::default())
                .await
            {
                warn!(error = %cancel, "basic_cancel failed");
            }
            return Err(e);
        }
    }
    warn!("consumer stream ended");
    Err(EndpointError::ConsumerCancelled.into())
}
