//! relay-core
//!
//! Core building blocks for a queue worker that sits between an input and an
//! output endpoint.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, token, outcome, errors）
//! - **ports**: 抽象化レイヤー（Endpoint, Work, PayloadCheck, OutputRouting）
//! - **app**: Worker と WorkerBuilder
//! - **impls**: 実装（InMemoryEndpoint, AmqpEndpoint, routing）
//! - **config** / **logging**: 環境変数の設定と tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod logging;
pub mod ports;

pub use app::{Worker, WorkerBuilder};
pub use domain::{DeliveryToken, Disposition, ErrorInfo, Message, Validation, WorkResult};
