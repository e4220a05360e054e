use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use relay_core::config::{AmqpConfig, RelayConfig};
use relay_core::domain::{BoxError, ErrorInfo, Message, Validation, WorkResult};
use relay_core::impls::{AmqpEndpoint, InMemoryEndpoint};
use relay_core::logging::init_logging;
use relay_core::ports::{Work, check_fn};
use relay_core::{Worker, WorkerBuilder};

/// オブジェクトに `processed_by` を付けて返すだけの Work
struct Annotate {
    name: String,
}

#[async_trait]
impl Work for Annotate {
    async fn work(&self, payload: &Message) -> Result<WorkResult, BoxError> {
        let mut output = payload.clone();
        let Some(map) = output.as_object_mut() else {
            return Ok(WorkResult::failed(
                json!({ "error": "payload is not an object" }),
                ErrorInfo::new("payload is not an object"),
            ));
        };

        if map.get("fail").and_then(Message::as_bool) == Some(true) {
            return Ok(WorkResult::failed(
                json!({ "error": "asked to fail", "input": payload }),
                ErrorInfo::new("asked to fail"),
            ));
        }

        map.insert("processed_by".to_string(), json!(self.name));
        Ok(WorkResult::ok(output))
    }
}

/// null は受け付けない
fn reject_null(payload: &Message) -> Validation {
    if payload.is_null() {
        Validation::reject(json!({ "error": "empty payload" }))
    } else {
        Validation::accept()
    }
}

/// RabbitMQ 上で Ctrl-C か購読の終了まで動かす
///
/// 処理中のエラーで購読が止まったら接続を閉じてそのエラーで終了する（未 ack は再配送される）。
async fn run_amqp(config: &AmqpConfig) -> Result<(), BoxError> {
    let endpoint = Arc::new(AmqpEndpoint::connect(config).await?);
    info!(channel = %endpoint, "running worker over amqp");

    let worker = WorkerBuilder::new()
        .channel(endpoint.clone())
        .work(Annotate {
            name: config.consumer_tag.clone(),
        })
        .payload_check(check_fn(reject_null))
        .build()?;
    worker.start().await?;

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("shutting down");
            signal.map_err(BoxError::from)
        }
        consumer = endpoint.closed() => {
            if let Err(e) = &consumer {
                error!(channel = %endpoint, error = %e, "consumer stopped");
            }
            consumer.map_err(BoxError::from)
        }
    };
    let closed = endpoint.close().await;
    outcome?;
    closed?;
    Ok(())
}

/// ブローカーなしのデモ：いくつかのメッセージを流して結果を表示する
async fn run_demo() -> Result<(), BoxError> {
    let channel = Arc::new(InMemoryEndpoint::new());
    let worker = Worker::with_check(
        channel.clone(),
        Annotate {
            name: "relay-demo".to_string(),
        },
        check_fn(reject_null),
    );
    worker.start().await?;

    let inputs = [
        json!({ "job": 1 }),
        json!({ "error": "upstream exploded" }),
        json!({ "error": {}, "job": 2 }),
        json!(null),
        json!({ "job": 3, "fail": true }),
    ];
    for input in inputs {
        let disposition = channel.push(input.clone()).await?;
        println!("{input} -> {disposition}");
    }

    println!("results: {}", json!(channel.pull().await));
    println!("acks: {:?}", channel.acks().await);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = RelayConfig::from_env()?;
    init_logging(&config.log);

    match &config.amqp {
        Some(amqp) => run_amqp(amqp).await,
        None => run_demo().await,
    }
}
