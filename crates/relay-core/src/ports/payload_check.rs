//! PayloadCheck port - ペイロードの妥当性チェック
//!
//! 省略時は `AcceptAll`（すべて妥当）を使います。

use async_trait::async_trait;

use crate::domain::{BoxError, Message, Validation};

#[async_trait]
pub trait PayloadCheck: Send + Sync {
    async fn check(&self, payload: &Message) -> Result<Validation, BoxError>;
}

/// デフォルト: すべてのペイロードを受け入れる
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl PayloadCheck for AcceptAll {
    async fn check(&self, _payload: &Message) -> Result<Validation, BoxError> {
        Ok(Validation::accept())
    }
}

pub struct CheckFn<F> {
    f: F,
}

pub fn check_fn<F>(f: F) -> CheckFn<F>
where
    F: Fn(&Message) -> Validation + Send + Sync,
{
    CheckFn { f }
}

#[async_trait]
impl<F> PayloadCheck for CheckFn<F>
where
    F: Fn(&Message) -> Validation + Send + Sync,
{
    async fn check(&self, payload: &Message) -> Result<Validation, BoxError> {
        Ok((self.f)(payload))
    }
}
