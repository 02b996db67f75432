//! # EIM Protocol
//!
//! 积木编程环境与 Arduino 适配器之间的消息协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `pin`: 引脚标识、逻辑电平、板卡引脚菜单
//! - `mode`: 引脚模式（本地登记用）与 Firmata 模式编号
//! - `command`: 发往适配器的命令字符串编码/解析
//! - `telemetry`: 适配器回传的遥测帧
//! - `blocks`: 积木操作码与字符串参数解析
//!
//! ## 消息方向
//!
//! ```text
//! Block 调用 → BoardCommand (Display) → OutboundMessage{topic, payload} → 适配器
//! 适配器 → TelemetryFrame{topic, payload: {"analog_pin_0": 512, ...}} → 遥测缓存
//! ```

pub mod blocks;
pub mod command;
pub mod mode;
pub mod pin;
pub mod telemetry;

// 重新导出常用类型
pub use blocks::{Block, BlockArgs};
pub use command::{BoardCommand, CommandBatch, OutboundMessage};
pub use mode::{FirmataMode, ModeConstant, PinMode};
pub use pin::{AnalogPin, BoardLayout, DigitalPin, LogicState, Pin, PinKind, PwmPin};
pub use telemetry::{PinReport, TelemetryFrame, TelemetryValue};

use thiserror::Error;

/// 命令下发主题（适配器订阅）
pub const COMMAND_TOPIC: &str = "eim/arduino";

/// 传感器遥测主题（与命令主题相同，适配器每轮轮询后发布）
pub const SENSOR_TOPIC: &str = "eim/arduino";

/// 会话（重新）开始信号主题
pub const INIT_TOPIC: &str = "eim/arduino/init";

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid value for field {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Unknown block opcode: {0}")]
    UnknownOpcode(String),

    #[error("Missing argument {argument} for block {opcode}")]
    MissingArgument {
        opcode: &'static str,
        argument: &'static str,
    },

    #[error("Malformed command string: {0:?}")]
    MalformedCommand(String),

    #[error("Malformed telemetry frame: {0}")]
    MalformedFrame(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}
