//! Domain model (messages, tokens, outcomes, errors).
//!
//! トランスポートにも Worker にも依存しない型だけを置く。

pub mod errors;
pub mod message;
pub mod outcome;
pub mod token;

pub use self::errors::{BoxError, EndpointError, WorkerError};
pub use self::message::{ERROR_FIELD, Message, is_truthy, upstream_error};
pub use self::outcome::{Disposition, ErrorInfo, Validation, WorkResult};
pub use self::token::DeliveryToken;
