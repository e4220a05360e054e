//! DeliveryToken - 配送中メッセージのハンドル
//!
//! トランスポートが配送時に発行し、ack / nack のときに返す不透明な値です。
//! テスト用のエンドポイントのように ack が意味を持たない場面では
//! `Option<DeliveryToken>` の `None` を使います。

use serde::{Deserialize, Serialize};
use std::fmt;

/// トランスポートの delivery tag を包む newtype
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryToken(u64);

impl DeliveryToken {
    pub fn new(tag: u64) -> Self {
        Self(tag)
    }

    /// トランスポートに返す生の tag
    pub fn tag(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeliveryToken {
    fn from(tag: u64) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_keeps_the_transport_tag() {
        let token = DeliveryToken::from(42);
        assert_eq!(token.tag(), 42);
        assert_eq!(token.to_string(), "delivery-42");
    }

    #[test]
    fn token_serializes_as_bare_number() {
        let s = serde_json::to_string(&DeliveryToken::new(7)).unwrap();
        assert_eq!(s, "7");
    }
}
