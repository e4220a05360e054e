//! OutputRouting port - 出力先 routing key の解決
//!
//! # 実装
//! - **StaticRouting**: 常に出力 ID をそのまま使う（デフォルト）
//! - **RoutingFn**: ペイロードを見て routing key を決めるクロージャ

use crate::domain::Message;

/// OutputRouting は送信ごとに routing key を決める
///
/// - `&self` のみなので object-safe（`Arc<dyn OutputRouting>` で保持）
/// - `output_id` は設定上の出力キュー名
pub trait OutputRouting: Send + Sync {
    fn routing_key(&self, output_id: &str, payload: &Message) -> String;
}
