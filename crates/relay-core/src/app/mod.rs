//! App - アプリケーション層
//!
//! ports を組み合わせて Worker のプロトコルを実装します。
//!
//! # 主要コンポーネント
//! - **Worker**: validate → work → dispatch → acknowledge
//! - **WorkerBuilder**: 入力・出力・フックのワイヤリングと起動時検証

pub mod builder;
pub mod worker;

pub use self::builder::{BuildError, WorkerBuilder};
pub use self::worker::Worker;
