//! 引脚模式定义
//!
//! - [`PinMode`]：桥接层本地登记的模式（每个引脚同一时刻只有一个）
//! - [`ModeConstant`]：`set_pin_mode` 命令携带的模式常量
//! - [`FirmataMode`]：适配器回报的 Firmata 模式编号（`pin_<n>_state`）

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 本地登记的引脚模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinMode {
    /// 从未配置（或会话重置后）
    #[default]
    Unconfigured,
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    PwmOutput,
    ServoOutput,
}

impl PinMode {
    /// 通过 `set_pin_mode` 配置该模式时使用的常量
    ///
    /// 舵机使用专用的 `servo_config` 命令，`Unconfigured` 无法下发，二者返回 `None`。
    pub fn mode_constant(self) -> Option<ModeConstant> {
        match self {
            PinMode::DigitalInput => Some(ModeConstant::Input),
            PinMode::DigitalOutput => Some(ModeConstant::Output),
            PinMode::AnalogInput => Some(ModeConstant::Analog),
            PinMode::PwmOutput => Some(ModeConstant::Pwm),
            PinMode::ServoOutput | PinMode::Unconfigured => None,
        }
    }

    pub fn is_configured(self) -> bool {
        self != PinMode::Unconfigured
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinMode::Unconfigured => "unconfigured",
            PinMode::DigitalInput => "digital-input",
            PinMode::DigitalOutput => "digital-output",
            PinMode::AnalogInput => "analog-input",
            PinMode::PwmOutput => "pwm-output",
            PinMode::ServoOutput => "servo-output",
        };
        f.write_str(name)
    }
}

/// `set_pin_mode` 的模式常量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeConstant {
    Input,
    Output,
    Analog,
    Pwm,
}

impl ModeConstant {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeConstant::Input => "INPUT",
            ModeConstant::Output => "OUTPUT",
            ModeConstant::Analog => "ANALOG",
            ModeConstant::Pwm => "PWM",
        }
    }

    /// 对应的本地登记模式
    pub fn pin_mode(self) -> PinMode {
        match self {
            ModeConstant::Input => PinMode::DigitalInput,
            ModeConstant::Output => PinMode::DigitalOutput,
            ModeConstant::Analog => PinMode::AnalogInput,
            ModeConstant::Pwm => PinMode::PwmOutput,
        }
    }
}

impl fmt::Display for ModeConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeConstant {
    type Err = ProtocolError;

    /// 接受 `OUTPUT` 或 `Constants.OUTPUT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("Constants.").unwrap_or(name);
        match name {
            "INPUT" => Ok(Self::Input),
            "OUTPUT" => Ok(Self::Output),
            "ANALOG" => Ok(Self::Analog),
            "PWM" => Ok(Self::Pwm),
            other => Err(ProtocolError::invalid("mode", other)),
        }
    }
}

/// Firmata 模式编号（pymata `Constants`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum FirmataMode {
    Input = 0x00,
    Output = 0x01,
    Analog = 0x02,
    Pwm = 0x03,
    Servo = 0x04,
    I2c = 0x06,
    OneWire = 0x07,
    Stepper = 0x08,
    Encoder = 0x09,
    Serial = 0x0A,
    Pullup = 0x0B,
    Sonar = 0x0C,
    Tone = 0x0D,
    /// 未知或被忽略的引脚
    #[default]
    Ignore = 0x7F,
}

impl FirmataMode {
    /// 映射为本地登记模式（仅限积木层会用到的模式）
    pub fn pin_mode(self) -> Option<PinMode> {
        match self {
            FirmataMode::Input | FirmataMode::Pullup => Some(PinMode::DigitalInput),
            FirmataMode::Output => Some(PinMode::DigitalOutput),
            FirmataMode::Analog => Some(PinMode::AnalogInput),
            FirmataMode::Pwm => Some(PinMode::PwmOutput),
            FirmataMode::Servo => Some(PinMode::ServoOutput),
            _ => None,
        }
    }
}
