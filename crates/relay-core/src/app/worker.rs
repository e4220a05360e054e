//! Worker - メッセージ処理プロトコル
//!
//! # フロー（この順序は固定）
//! 1. 上流エラーの転送: `"error"` が truthy ならそのまま送信して ack
//! 2. 検証: PayloadCheck が invalid なら rejection を送信して nack
//! 3. Work 実行
//! 4. 結果を送信（必ず 1 回）
//! 5. failure がなければ ack、あれば ack も nack もしない
//!
//! 1 メッセージにつき send はちょうど 1 回、ack は高々 1 回。
//! Work / PayloadCheck / Endpoint の `Err` はそのまま呼び出し元へ伝播し、リトライはしない。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::app::builder::WorkerBuilder;
use crate::domain::message::{summarize, upstream_error};
use crate::domain::{DeliveryToken, Disposition, EndpointError, Message, WorkResult, WorkerError};
use crate::ports::{AcceptAll, Endpoint, MessageHandler, PayloadCheck, Work};

/// Worker は入力を購読し、処理結果を出力へ送る
///
/// 構築後は不変。状態はエンドポイントと 2 つのフックへの参照だけなので、
/// clone しても同じ Worker として振る舞う。
#[derive(Clone)]
pub struct Worker {
    input: Arc<dyn Endpoint>,
    output: Arc<dyn Endpoint>,
    work: Arc<dyn Work>,
    check: Arc<dyn PayloadCheck>,
}

impl Worker {
    /// 双方向チャネル 1 本で Worker を作る（検証なし）
    pub fn new(channel: Arc<dyn Endpoint>, work: impl Work + 'static) -> Self {
        Self::from_parts(channel.clone(), channel, Arc::new(work), Arc::new(AcceptAll))
    }

    pub fn with_check(
        channel: Arc<dyn Endpoint>,
        work: impl Work + 'static,
        check: impl PayloadCheck + 'static,
    ) -> Self {
        Self::from_parts(channel.clone(), channel, Arc::new(work), Arc::new(check))
    }

    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::new()
    }

    pub(crate) fn from_parts(
        input: Arc<dyn Endpoint>,
        output: Arc<dyn Endpoint>,
        work: Arc<dyn Work>,
        check: Arc<dyn PayloadCheck>,
    ) -> Self {
        info!(
            input = %input.describe(),
            output = %output.describe(),
            "creating worker"
        );
        Self {
            input,
            output,
            work,
            check,
        }
    }

    /// 入力エンドポイントに自分自身を handler として登録する
    pub async fn start(&self) -> Result<(), EndpointError> {
        info!("starting worker");
        let handler: Arc<dyn MessageHandler> = Arc::new(self.clone());
        self.input.listen(handler).await
    }

    /// 1 メッセージを処理する
    pub async fn process(
        &self,
        token: Option<DeliveryToken>,
        payload: Message,
    ) -> Result<Disposition, WorkerError> {
        info!(?token, payload = %summarize(&payload), "processing work unit");

        if let Some(err) = upstream_error(&payload) {
            error!(?token, error = %err, "forwarding upstream error");
            self.send(payload).await?;
            return self.settle(token, Disposition::Forwarded).await;
        }

        debug!(?token, "checking payload");
        let validation = self
            .check
            .check(&payload)
            .await
            .map_err(WorkerError::PayloadCheck)?;
        if !validation.valid {
            warn!(?token, "payload rejected");
            self.send(validation.rejection).await?;
            return self.settle(token, Disposition::Rejected).await;
        }

        debug!(?token, "doing work");
        let WorkResult { output, failure } = self
            .work
            .work(&payload)
            .await
            .map_err(WorkerError::Work)?;

        self.send(output).await?;

        let disposition = match failure {
            None => Disposition::Completed,
            Some(failure) => {
                warn!(?token, failure = %failure, "work failed, acknowledgement withheld");
                Disposition::Withheld
            }
        };
        let disposition = self.settle(token, disposition).await?;

        info!(?token, %disposition, "done processing work unit");
        Ok(disposition)
    }

    /// disposition に対応する ack / nack を出す（Withheld は何もしない）
    async fn settle(
        &self,
        token: Option<DeliveryToken>,
        disposition: Disposition,
    ) -> Result<Disposition, WorkerError> {
        if let Some(is_nack) = disposition.acknowledgment() {
            self.acknowledge(token, is_nack).await?;
        }
        Ok(disposition)
    }

    async fn send(&self, payload: Message) -> Result<(), EndpointError> {
        debug!("sending payload");
        self.output.send(payload).await
    }

    async fn acknowledge(
        &self,
        token: Option<DeliveryToken>,
        is_nack: bool,
    ) -> Result<(), EndpointError> {
        info!(?token, is_nack, "sending acknowledgement");
        self.input.ack(token, is_nack).await
    }
}

#[async_trait]
impl MessageHandler for Worker {
    async fn handle(
        &self,
        token: Option<DeliveryToken>,
        payload: Message,
    ) -> Result<Disposition, WorkerError> {
        self.process(token, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoxError, ErrorInfo, Validation};
    use crate::impls::InMemoryEndpoint;
    use crate::ports::{check_fn, work_fn};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";

    fn identity() -> impl Work {
        work_fn(|payload| WorkResult::ok(payload.clone()))
    }

    fn worked() -> impl Work {
        work_fn(|_| WorkResult::ok(json!("WORKED")))
    }

    fn all_payloads_are_invalid() -> impl PayloadCheck {
        check_fn(|_| Validation::reject(json!(INVALID_PAYLOAD)))
    }

    /// 呼ばれた回数を数える Work
    #[derive(Default)]
    struct CountingWork {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Work for Arc<CountingWork> {
        async fn work(&self, _payload: &Message) -> Result<WorkResult, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WorkResult::ok(json!("WORKED")))
        }
    }

    struct FailingWork;

    #[async_trait]
    impl Work for FailingWork {
        async fn work(&self, payload: &Message) -> Result<WorkResult, BoxError> {
            Ok(WorkResult::failed(
                json!({"error": "could not process", "input": payload}),
                ErrorInfo::new("could not process"),
            ))
        }
    }

    struct ExplodingWork;

    #[async_trait]
    impl Work for ExplodingWork {
        async fn work(&self, _payload: &Message) -> Result<WorkResult, BoxError> {
            Err("database unreachable".into())
        }
    }

    struct ExplodingCheck;

    #[async_trait]
    impl PayloadCheck for ExplodingCheck {
        async fn check(&self, _payload: &Message) -> Result<Validation, BoxError> {
            Err("schema registry unreachable".into())
        }
    }

    /// send が必ず失敗する出力エンドポイント
    #[derive(Default)]
    struct BrokenOutput {
        sends: AtomicUsize,
        acks: AtomicUsize,
    }

    #[async_trait]
    impl Endpoint for BrokenOutput {
        async fn listen(&self, _handler: Arc<dyn MessageHandler>) -> Result<(), EndpointError> {
            Ok(())
        }

        async fn send(&self, _payload: Message) -> Result<(), EndpointError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Err(EndpointError::transport("broker went away"))
        }

        async fn ack(
            &self,
            _token: Option<DeliveryToken>,
            _is_nack: bool,
        ) -> Result<(), EndpointError> {
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn with_broken_output(
        check: impl PayloadCheck + 'static,
    ) -> (Arc<InMemoryEndpoint>, Arc<BrokenOutput>) {
        let input = Arc::new(InMemoryEndpoint::new());
        let output = Arc::new(BrokenOutput::default());
        let worker = Worker::builder()
            .input(input.clone())
            .output(output.clone())
            .work(worked())
            .payload_check(check)
            .build()
            .unwrap();
        worker.start().await.unwrap();
        (input, output)
    }

    async fn started(worker: Worker) -> Worker {
        worker.start().await.unwrap();
        worker
    }

    #[tokio::test]
    async fn test_basic_worker() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::new(channel.clone(), identity())).await;

        let disposition = channel.push(json!("TEST")).await.unwrap();

        assert_eq!(disposition, Disposition::Completed);
        assert_eq!(channel.pull().await, vec![json!("TEST")]);
        assert_eq!(channel.acks().await, vec![true]);
    }

    #[tokio::test]
    async fn test_invalid_payload_sends_error_and_nacks() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let counter = Arc::new(CountingWork::default());
        let _w = started(Worker::with_check(
            channel.clone(),
            counter.clone(),
            all_payloads_are_invalid(),
        ))
        .await;

        let disposition = channel.push(json!("TEST")).await.unwrap();

        assert_eq!(disposition, Disposition::Rejected);
        assert_eq!(channel.pull().await, vec![json!(INVALID_PAYLOAD)]);
        assert_eq!(channel.acks().await, vec![false]);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forward_payload_error() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let counter = Arc::new(CountingWork::default());
        let _w = started(Worker::new(channel.clone(), counter.clone())).await;

        let error_payload = json!({"error": "Some error"});
        let disposition = channel.push(error_payload.clone()).await.unwrap();

        assert_eq!(disposition, Disposition::Forwarded);
        assert_eq!(channel.pull().await, vec![error_payload]);
        assert_eq!(channel.acks().await, vec![true]);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forwarded_error_skips_payload_check() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::with_check(
            channel.clone(),
            worked(),
            all_payloads_are_invalid(),
        ))
        .await;

        let error_payload = json!({"error": {"code": 500}, "job": 1});
        channel.push(error_payload.clone()).await.unwrap();

        assert_eq!(channel.pull().await, vec![error_payload]);
        assert_eq!(channel.acks().await, vec![true]);
    }

    #[tokio::test]
    async fn test_error_field_with_no_error() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::new(channel.clone(), worked())).await;

        channel.push(json!({"error": {}})).await.unwrap();

        assert_eq!(channel.pull().await, vec![json!("WORKED")]);
        assert_eq!(channel.acks().await, vec![true]);
    }

    #[tokio::test]
    async fn test_falsy_error_values_do_not_short_circuit() {
        for error in [json!(null), json!(false), json!(0), json!(""), json!([])] {
            let channel = Arc::new(InMemoryEndpoint::new());
            let _w = started(Worker::new(channel.clone(), worked())).await;

            let disposition = channel.push(json!({ "error": error })).await.unwrap();

            assert_eq!(disposition, Disposition::Completed, "error = {error}");
            assert_eq!(channel.pull().await, vec![json!("WORKED")]);
            assert_eq!(channel.acks().await, vec![true]);
        }
    }

    #[tokio::test]
    async fn test_work_failure_sends_result_and_withholds_ack() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::new(channel.clone(), FailingWork)).await;

        let disposition = channel.push(json!({"job": 7})).await.unwrap();

        assert_eq!(disposition, Disposition::Withheld);
        assert_eq!(
            channel.pull().await,
            vec![json!({"error": "could not process", "input": {"job": 7}})]
        );
        assert!(channel.acks().await.is_empty());
    }

    #[tokio::test]
    async fn test_work_error_propagates_without_send_or_ack() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::new(channel.clone(), ExplodingWork)).await;

        let err = channel.push(json!("TEST")).await.unwrap_err();

        assert!(matches!(err, WorkerError::Work(_)));
        assert!(channel.pull().await.is_empty());
        assert!(channel.acks().await.is_empty());
    }

    #[tokio::test]
    async fn test_payload_check_error_propagates() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let counter = Arc::new(CountingWork::default());
        let _w = started(Worker::with_check(channel.clone(), counter.clone(), ExplodingCheck)).await;

        let err = channel.push(json!("TEST")).await.unwrap_err();

        assert!(matches!(err, WorkerError::PayloadCheck(_)));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
        assert!(channel.pull().await.is_empty());
        assert!(channel.acks().await.is_empty());
    }

    #[tokio::test]
    async fn test_each_message_gets_one_output_and_one_ack() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let _w = started(Worker::new(channel.clone(), identity())).await;

        for i in 0..5 {
            channel.push(json!({ "n": i })).await.unwrap();
        }

        let results = channel.pull().await;
        assert_eq!(results.len(), 5);
        assert_eq!(results[3], json!({"n": 3}));
        assert_eq!(channel.acks().await, vec![true; 5]);
    }

    #[tokio::test]
    async fn test_process_is_callable_without_start() {
        let channel = Arc::new(InMemoryEndpoint::new());
        let worker = Worker::new(channel.clone(), worked());

        let disposition = worker
            .process(Some(DeliveryToken::new(9)), json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Completed);
        assert!(!channel.is_listening().await);
        assert_eq!(channel.acks().await, vec![true]);
    }

    #[tokio::test]
    async fn test_separate_input_and_output() {
        let input = Arc::new(InMemoryEndpoint::new());
        let output = Arc::new(InMemoryEndpoint::new());
        let worker = Worker::builder()
            .input(input.clone())
            .output(output.clone())
            .work(worked())
            .build()
            .unwrap();
        worker.start().await.unwrap();

        input.push(json!("TEST")).await.unwrap();

        assert!(input.pull().await.is_empty());
        assert_eq!(output.pull().await, vec![json!("WORKED")]);
        assert_eq!(input.acks().await, vec![true]);
        assert!(output.acks().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_propagates_without_ack() {
        let (input, output) = with_broken_output(AcceptAll).await;

        let err = input.push(json!("TEST")).await.unwrap_err();

        assert!(matches!(err, WorkerError::Endpoint(EndpointError::Transport(_))));
        assert_eq!(output.sends.load(Ordering::SeqCst), 1);
        assert!(input.acks().await.is_empty());
        assert_eq!(output.acks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejection_send_failure_propagates_without_nack() {
        let (input, output) = with_broken_output(all_payloads_are_invalid()).await;

        let err = input.push(json!("TEST")).await.unwrap_err();

        assert!(matches!(err, WorkerError::Endpoint(EndpointError::Transport(_))));
        assert_eq!(output.sends.load(Ordering::SeqCst), 1);
        assert!(input.acks().await.is_empty());
    }

    #[tokio::test]
    async fn test_forward_send_failure_propagates_without_ack() {
        let (input, _output) = with_broken_output(AcceptAll).await;

        let err = input.push(json!({"error": "upstream"})).await.unwrap_err();

        assert!(matches!(err, WorkerError::Endpoint(_)));
        assert!(input.acks().await.is_empty());
    }

    #[test]
    fn test_endpoints_describe_themselves() {
        let output = BrokenOutput::default();
        assert!(output.describe().ends_with("BrokenOutput"));
        assert_eq!(InMemoryEndpoint::new().describe(), "in-memory");
    }
}
