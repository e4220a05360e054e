//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryEndpoint**: テスト・デモ用の双方向エンドポイント
//! - **AmqpEndpoint**: RabbitMQ（lapin）
//! - **StaticRouting / RoutingFn**: 出力 routing key の解決

pub mod amqp_endpoint;
pub mod inmem_endpoint;
pub mod routing;

// 主要な型を再エクスポート
pub use self::amqp_endpoint::AmqpEndpoint;
pub use self::inmem_endpoint::InMemoryEndpoint;
pub use self::routing::{RoutingFn, StaticRouting, routing_fn};
