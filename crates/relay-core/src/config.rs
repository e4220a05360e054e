//! Config - 環境変数からの設定読み込み
//!
//! `.env` があれば dotenvy で読み込み、そのあと `RELAY_*` を参照します。
//! `RELAY_AMQP_URL` が無ければ AMQP 設定は `None`（インメモリで動かす想定）。

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::logging::LogConfig;

pub const ENV_PREFIX: &str = "RELAY_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// RabbitMQ 接続の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmqpConfig {
    pub url: String,
    pub exchange: String,
    /// 入力キュー名（= routing key）
    pub input_queue: String,
    /// 出力 ID。OutputRouting に渡される
    pub output_queue: String,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// nack 時にブローカーへ再キューを要求するか
    #[serde(default)]
    pub nack_requeue: bool,
    #[serde(default = "default_consumer_tag")]
    pub consumer_tag: String,
}

fn default_prefetch() -> u16 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_consumer_tag() -> String {
    "relay-worker".to_string()
}

impl AmqpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub amqp: Option<AmqpConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

impl RelayConfig {
    /// `.env`（あれば）と環境変数から読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) => debug!(error = %e, "no .env loaded"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// キー（`RELAY_` 付き）から値を引く関数で読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup { lookup };

        let mut log = LogConfig::default();
        if let Some(level) = env.get("LOG_LEVEL") {
            log.level = level;
        }
        if let Some(json) = env.parse::<Flag>("LOG_JSON")? {
            log.json = json.0;
        }

        let amqp = match env.get("AMQP_URL") {
            None => None,
            Some(url) => Some(AmqpConfig {
                url,
                exchange: env.require("EXCHANGE")?,
                input_queue: env.require("INPUT_QUEUE")?,
                output_queue: env.require("OUTPUT_QUEUE")?,
                prefetch: env.parse("PREFETCH")?.unwrap_or_else(default_prefetch),
                connect_timeout_secs: env
                    .parse("CONNECT_TIMEOUT_SECS")?
                    .unwrap_or_else(default_connect_timeout_secs),
                nack_requeue: env.parse::<Flag>("NACK_REQUEUE")?.is_some_and(|f| f.0),
                consumer_tag: env.get("CONSUMER_TAG").unwrap_or_else(default_consumer_tag),
            }),
        };

        Ok(Self { amqp, log })
    }
}

struct Lookup<F> {
    lookup: F,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(name: &str) -> String {
        format!("{ENV_PREFIX}{name}")
    }

    /// 空文字は未設定扱い
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&Self::key(name)).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Missing(Self::key(name)))
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: Self::key(name),
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// `true/false/1/0/yes/no/on/off` を受け付ける bool
struct Flag(bool);

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Flag(true)),
            "false" | "0" | "no" | "off" => Ok(Flag(false)),
            other => Err(format!("expected a boolean, got {other:?}")),
        }
    }
}
