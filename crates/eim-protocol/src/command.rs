//! 命令字符串编码/解析
//!
//! 适配器把收到的 payload 当作表达式在 Firmata 板卡对象上求值，因此编码格式固定为：
//!
//! ```text
//! board.set_pin_mode(13, Constants.OUTPUT)
//! board.digital_write(13,1)
//! board.analog_write(9,50)
//! board.servo_config(9)
//! quit!
//! ```
//!
//! 解析同时接受省略 `board.` / `Constants.` 前缀的简写形式。

use crate::mode::ModeConstant;
use crate::pin::LogicState;
use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// 单次积木操作产生的命令序列
///
/// 最多两条：可选的模式配置命令 + 数据命令，栈上预留 2 个位置避免堆分配。
pub type CommandBatch = SmallVec<[BoardCommand; 2]>;

/// 板卡命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardCommand {
    /// 配置引脚模式
    SetPinMode { pin: u8, mode: ModeConstant },
    /// 数字输出
    DigitalWrite { pin: u8, state: LogicState },
    /// PWM 占空比或舵机角度（不做范围校验）
    AnalogWrite { pin: u8, value: i64 },
    /// 舵机模式配置（替代 `set_pin_mode`）
    ServoConfig { pin: u8 },
    /// 请求适配器关闭板卡连接
    Shutdown,
}

impl BoardCommand {
    /// 是否为模式配置命令
    pub fn is_mode_config(&self) -> bool {
        matches!(
            self,
            BoardCommand::SetPinMode { .. } | BoardCommand::ServoConfig { .. }
        )
    }

    /// 命令作用的引脚编号
    pub fn pin(&self) -> Option<u8> {
        match *self {
            BoardCommand::SetPinMode { pin, .. }
            | BoardCommand::DigitalWrite { pin, .. }
            | BoardCommand::AnalogWrite { pin, .. }
            | BoardCommand::ServoConfig { pin } => Some(pin),
            BoardCommand::Shutdown => None,
        }
    }
}

const SHUTDOWN: &str = "quit!";

impl fmt::Display for BoardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardCommand::SetPinMode { pin, mode } => {
                write!(f, "board.set_pin_mode({}, Constants.{})", pin, mode)
            },
            BoardCommand::DigitalWrite { pin, state } => {
                write!(f, "board.digital_write({},{})", pin, state)
            },
            BoardCommand::AnalogWrite { pin, value } => {
                write!(f, "board.analog_write({},{})", pin, value)
            },
            BoardCommand::ServoConfig { pin } => write!(f, "board.servo_config({})", pin),
            BoardCommand::Shutdown => f.write_str(SHUTDOWN),
        }
    }
}

impl FromStr for BoardCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedCommand(s.to_string());

        let text = s.trim();
        if text == SHUTDOWN {
            return Ok(BoardCommand::Shutdown);
        }

        let text = text.strip_prefix("board.").unwrap_or(text);
        let (name, rest) = text.split_once('(').ok_or_else(malformed)?;
        let inner = rest.strip_suffix(')').ok_or_else(malformed)?;
        let args: SmallVec<[&str; 2]> = inner.split(',').map(str::trim).collect();

        let pin = |idx: usize| -> Result<u8, ProtocolError> {
            let raw = args.get(idx).ok_or_else(malformed)?;
            raw.parse::<u8>()
                .map_err(|_| ProtocolError::invalid("pin", *raw))
        };

        let command = match (name.trim(), args.len()) {
            ("set_pin_mode", 2) => BoardCommand::SetPinMode {
                pin: pin(0)?,
                mode: args[1].parse()?,
            },
            ("digital_write", 2) => BoardCommand::DigitalWrite {
                pin: pin(0)?,
                state: args[1].parse()?,
            },
            ("analog_write", 2) => BoardCommand::AnalogWrite {
                pin: pin(0)?,
                value: args[1]
                    .parse()
                    .map_err(|_| ProtocolError::invalid("value", args[1]))?,
            },
            ("servo_config", 1) => BoardCommand::ServoConfig { pin: pin(0)? },
            _ => return Err(malformed()),
        };
        Ok(command)
    }
}

/// 发往适配器的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, command: &BoardCommand) -> Self {
        Self {
            topic: topic.into(),
            payload: command.to_string(),
        }
    }

    /// 按命令字符串解析 payload
    pub fn command(&self) -> Result<BoardCommand, ProtocolError> {
        self.payload.parse()
    }
}
