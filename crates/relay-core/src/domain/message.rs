//! Message - ワーカーが扱うペイロード
//!
//! Message は JSON ドキュメントそのもの（`serde_json::Value`）です。
//! スカラー（例: `"TEST"`）も有効なペイロードですが、予約フィールド
//! `"error"` を持てるのはオブジェクトだけです。

use serde_json::Value;

/// ワイヤ上のペイロード
pub type Message = Value;

/// 上流の失敗を表す予約フィールド
pub const ERROR_FIELD: &str = "error";

/// 上流のエラーを取り出す
///
/// `"error"` キーが存在し、かつ値が truthy のときだけ `Some` を返します。
/// `{"error": {}}` のような falsy な値は通常のペイロードとして扱います。
pub fn upstream_error(payload: &Message) -> Option<&Value> {
    payload
        .as_object()?
        .get(ERROR_FIELD)
        .filter(|value| is_truthy(value))
}

/// 動的言語風の truthiness
///
/// falsy: `null`, `false`, `0` / `0.0`, `""`, `[]`, `{}`
/// それ以外はすべて truthy。
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().is_some_and(|f| f != 0.0)
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// ログ用の短い要約（オブジェクトならキー一覧、それ以外は値そのもの）
pub(crate) fn summarize(payload: &Message) -> String {
    match payload.as_object() {
        Some(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("keys={keys:?}")
        }
        None => payload.to_string(),
    }
}
