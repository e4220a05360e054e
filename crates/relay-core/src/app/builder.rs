//! WorkerBuilder - Worker の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use crate::app::worker::Worker;
use crate::ports::{AcceptAll, Endpoint, PayloadCheck, Work};

/// WorkerBuilder は Worker を構築
///
/// # 使用例
/// ```ignore
/// let worker = Worker::builder()
///     .input(input_queue)
///     .output(output_queue)
///     .work(work_fn(|p| WorkResult::ok(p.clone())))
///     .payload_check(check_fn(|p| Validation::accept()))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - input / output / work のどれかが欠けていたら build() が BuildError を返す
/// - payload_check は省略可能（AcceptAll）
#[derive(Default)]
pub struct WorkerBuilder {
    input: Option<Arc<dyn Endpoint>>,
    output: Option<Arc<dyn Endpoint>>,
    work: Option<Arc<dyn Work>>,
    check: Option<Arc<dyn PayloadCheck>>,
}

/// BuildError は Worker 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing worker parts: {0:?}. These must be set before build().")]
    MissingParts(Vec<&'static str>),
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力と出力に同じ双方向チャネルを使う
    pub fn channel(mut self, channel: Arc<dyn Endpoint>) -> Self {
        self.input = Some(channel.clone());
        self.output = Some(channel);
        self
    }

    pub fn input(mut self, input: Arc<dyn Endpoint>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn output(mut self, output: Arc<dyn Endpoint>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn work(mut self, work: impl Work + 'static) -> Self {
        self.work = Some(Arc::new(work));
        self
    }

    pub fn payload_check(mut self, check: impl PayloadCheck + 'static) -> Self {
        self.check = Some(Arc::new(check));
        self
    }

    /// # 検証
    /// - input / output / work が揃っているかチェック
    /// - 不足があれば BuildError::MissingParts を返す
    pub fn build(self) -> Result<Worker, BuildError> {
        let mut missing = Vec::new();
        if self.input.is_none() {
            missing.push("input");
        }
        if self.output.is_none() {
            missing.push("output");
        }
        if self.work.is_none() {
            missing.push("work");
        }

        match (self.input, self.output, self.work) {
            (Some(input), Some(output), Some(work)) => {
                let check = self.check.unwrap_or_else(|| Arc::new(AcceptAll));
                Ok(Worker::from_parts(input, output, work, check))
            }
            _ => Err(BuildError::MissingParts(missing)),
        }
    }
}
