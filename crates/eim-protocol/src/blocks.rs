//! 积木操作面
//!
//! 可视化编程层以「操作码 + 字符串参数」调用积木，这里按板卡菜单把参数转换为强类型请求。
//!
//! | 操作码 | 参数 | 类型 |
//! |---|---|---|
//! | `read_analog_value` | `analogPinNumber` | 报告（reporter） |
//! | `read_button_state` | `digitalPinNumber` | 报告（reporter） |
//! | `changeLedState` | `digitalPinNumber`, `logicState` | 命令 |
//! | `changePwmLedValue` | `PwmPinNumber`, `pwmValue` | 命令 |
//! | `changeServoDegree` | `PwmPinNumber`, `degree` | 命令 |

use crate::pin::{parse_numeric, AnalogPin, BoardLayout, DigitalPin, LogicState, PwmPin};
use crate::ProtocolError;
use std::collections::HashMap;

/// 积木的字符串参数表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockArgs(HashMap<String, String>);

impl BlockArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn require(&self, opcode: &'static str, argument: &'static str) -> Result<&str, ProtocolError> {
        self.get(argument)
            .ok_or(ProtocolError::MissingArgument { opcode, argument })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BlockArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 积木请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    ReadAnalogValue { pin: AnalogPin },
    ReadButtonState { pin: DigitalPin },
    ChangeLedState { pin: DigitalPin, state: LogicState },
    ChangePwmLedValue { pin: PwmPin, value: i64 },
    ChangeServoDegree { pin: PwmPin, degree: i64 },
}

impl Block {
    pub const READ_ANALOG_VALUE: &'static str = "read_analog_value";
    pub const READ_BUTTON_STATE: &'static str = "read_button_state";
    pub const CHANGE_LED_STATE: &'static str = "changeLedState";
    pub const CHANGE_PWM_LED_VALUE: &'static str = "changePwmLedValue";
    pub const CHANGE_SERVO_DEGREE: &'static str = "changeServoDegree";

    /// 所有操作码
    pub const OPCODES: [&'static str; 5] = [
        Self::READ_ANALOG_VALUE,
        Self::CHANGE_LED_STATE,
        Self::CHANGE_PWM_LED_VALUE,
        Self::READ_BUTTON_STATE,
        Self::CHANGE_SERVO_DEGREE,
    ];

    /// 按操作码解析字符串参数
    pub fn from_opcode(
        opcode: &str,
        args: &BlockArgs,
        layout: &BoardLayout,
    ) -> Result<Self, ProtocolError> {
        let block = match opcode {
            Self::READ_ANALOG_VALUE => {
                let pin = args.require(Self::READ_ANALOG_VALUE, "analogPinNumber")?;
                Block::ReadAnalogValue {
                    pin: layout.parse_analog(pin)?,
                }
            },
            Self::READ_BUTTON_STATE => {
                let pin = args.require(Self::READ_BUTTON_STATE, "digitalPinNumber")?;
                Block::ReadButtonState {
                    pin: layout.parse_digital(pin)?,
                }
            },
            Self::CHANGE_LED_STATE => {
                let pin = args.require(Self::CHANGE_LED_STATE, "digitalPinNumber")?;
                let state = args.require(Self::CHANGE_LED_STATE, "logicState")?;
                Block::ChangeLedState {
                    pin: layout.parse_digital(pin)?,
                    state: state.parse()?,
                }
            },
            Self::CHANGE_PWM_LED_VALUE => {
                let pin = args.require(Self::CHANGE_PWM_LED_VALUE, "PwmPinNumber")?;
                let value = args.require(Self::CHANGE_PWM_LED_VALUE, "pwmValue")?;
                Block::ChangePwmLedValue {
                    pin: layout.parse_pwm(pin)?,
                    value: parse_numeric("pwmValue", value)?,
                }
            },
            Self::CHANGE_SERVO_DEGREE => {
                let pin = args.require(Self::CHANGE_SERVO_DEGREE, "PwmPinNumber")?;
                let degree = args.require(Self::CHANGE_SERVO_DEGREE, "degree")?;
                Block::ChangeServoDegree {
                    pin: layout.parse_pwm(pin)?,
                    degree: parse_numeric("degree", degree)?,
                }
            },
            other => return Err(ProtocolError::UnknownOpcode(other.to_string())),
        };
        Ok(block)
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            Block::ReadAnalogValue { .. } => Self::READ_ANALOG_VALUE,
            Block::ReadButtonState { .. } => Self::READ_BUTTON_STATE,
            Block::ChangeLedState { .. } => Self::CHANGE_LED_STATE,
            Block::ChangePwmLedValue { .. } => Self::CHANGE_PWM_LED_VALUE,
            Block::ChangeServoDegree { .. } => Self::CHANGE_SERVO_DEGREE,
        }
    }

    /// 报告型积木（返回值），其余为命令型积木（返回 settlement）
    pub fn is_reporter(&self) -> bool {
        matches!(
            self,
            Block::ReadAnalogValue { .. } | Block::ReadButtonState { .. }
        )
    }
}
