//! Ports - 抽象化レイヤー
//!
//! Worker が依存する外部との境界をすべて trait で定義します。
//! 実装の詳細（RabbitMQ, インメモリ）は `impls` に置きます。

pub mod endpoint;
pub mod payload_check;
pub mod routing;
pub mod work;

// 主要な trait を再エクスポート
pub use self::endpoint::{Endpoint, MessageHandler};
pub use self::payload_check::{AcceptAll, CheckFn, PayloadCheck, check_fn};
pub use self::routing::OutputRouting;
pub use self::work::{Work, WorkFn, work_fn};
