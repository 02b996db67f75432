//! 遥测帧定义
//!
//! 适配器每轮轮询后发布一帧：
//!
//! ```json
//! {"topic": "eim/arduino",
//!  "payload": {"digital_pin_12": 1, "analog_pin_0": 512, "pin_13_state": [13, 1, 1], "output": "None"}}
//! ```
//!
//! 初始化帧 `eim/arduino/init` 的 payload 为空字符串，不携带语义。

use crate::pin::Pin;
use crate::mode::FirmataMode;
use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 适配器回传的遥测帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl TelemetryFrame {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// 从一行 JSON 解析
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        let frame: TelemetryFrame = serde_json::from_str(line)?;
        if frame.topic.is_empty() {
            return Err(ProtocolError::MalformedFrame("empty topic".into()));
        }
        Ok(frame)
    }

    /// payload 为对象时返回键值表（初始化帧等返回 `None`）
    pub fn payload_object(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }

    /// 读取指定键的标量值
    pub fn value(&self, key: &str) -> Option<TelemetryValue> {
        self.payload_object()
            .and_then(|map| map.get(key))
            .and_then(TelemetryValue::from_json)
    }

    /// 读取指定引脚的观测值
    pub fn pin_value(&self, pin: Pin) -> Option<TelemetryValue> {
        self.value(&pin.state_key())
    }
}

/// 遥测观测值
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl TelemetryValue {
    /// 从 JSON 标量转换，`null`（适配器的 `None`）及数组/对象返回 `None`
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => Some(f.round() as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// 适配器回报的引脚状态（`pin_<n>_state`）
///
/// 格式为 `[pin, mode, value]`，旧版适配器可能缺少 value。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinReport {
    pub pin: u8,
    pub mode: FirmataMode,
    pub value: Option<i64>,
}

impl PinReport {
    /// 报告键，如 `pin_13_state`
    pub fn key(index: u8) -> String {
        format!("pin_{}_state", index)
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        let pin = u8::try_from(items.first()?.as_u64()?).ok()?;
        let mode = u8::try_from(items.get(1)?.as_u64()?).ok()?;
        Some(Self {
            pin,
            mode: FirmataMode::from(mode),
            value: items.get(2).and_then(Value::as_i64),
        })
    }
}
