//! Work port - ペイロードを処理するフック
//!
//! # 学習ポイント
//! - async trait を trait object（`Arc<dyn Work>`）として保持
//! - クロージャを newtype で包んで trait を実装（`work_fn`）

use async_trait::async_trait;

use crate::domain::{BoxError, Message, WorkResult};

/// Work は 1 メッセージ分の処理を行う
///
/// `Ok(WorkResult)` の `failure` は「業務上の失敗」で、結果は送信されるが ack はされない。
/// `Err` は想定外の失敗で、`process` からそのまま呼び出し元へ伝播する。
#[async_trait]
pub trait Work: Send + Sync {
    async fn work(&self, payload: &Message) -> Result<WorkResult, BoxError>;
}

/// 同期クロージャを Work として使うためのアダプタ
pub struct WorkFn<F> {
    f: F,
}

/// ```ignore
/// let work = work_fn(|payload| WorkResult::ok(payload.clone()));
/// ```
pub fn work_fn<F>(f: F) -> WorkFn<F>
where
    F: Fn(&Message) -> WorkResult + Send + Sync,
{
    WorkFn { f }
}

#[async_trait]
impl<F> Work for WorkFn<F>
where
    F: Fn(&Message) -> WorkResult + Send + Sync,
{
    async fn work(&self, payload: &Message) -> Result<WorkResult, BoxError> {
        Ok((self.f)(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn work_fn_wraps_a_closure() {
        let work = work_fn(|payload| WorkResult::ok(json!({ "echo": payload })));
        let result = work.work(&json!("TEST")).await.unwrap();
        assert_eq!(result.output, json!({"echo": "TEST"}));
        assert!(result.failure.is_none());
    }
}
