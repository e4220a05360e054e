//! OutputRouting の実装
//!
//! StaticRouting は最もシンプルな実装で、出力 ID を 1:1 で routing key にします。

use crate::domain::Message;
use crate::ports::OutputRouting;

pub struct StaticRouting;

impl StaticRouting {
    pub fn new() -> Self {
        Self
    }
}

impl OutputRouting for StaticRouting {
    fn routing_key(&self, output_id: &str, _payload: &Message) -> String {
        output_id.to_string()
    }
}

impl Default for StaticRouting {
    fn default() -> Self {
        Self::new()
    }
}

/// クロージャで routing key を決める
pub struct RoutingFn<F> {
    f: F,
}

/// ```ignore
/// // {"kind": "image"} -> "results.image"
/// let routing = routing_fn(|output_id, payload| {
///     match payload["kind"].as_str() {
///         Some(kind) => format!("{output_id}.{kind}"),
///         None => output_id.to_string(),
///     }
/// });
/// ```
pub fn routing_fn<F>(f: F) -> RoutingFn<F>
where
    F: Fn(&str, &Message) -> String + Send + Sync,
{
    RoutingFn { f }
}

impl<F> OutputRouting for RoutingFn<F>
where
    F: Fn(&str, &Message) -> String + Send + Sync,
{
    fn routing_key(&self, output_id: &str, payload: &Message) -> String {
        (self.f)(output_id, payload)
    }
}
