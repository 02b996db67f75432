//! 引脚定义
//!
//! 引脚由「种类 + 编号」组成复合键（如数字引脚 13、模拟引脚 0）。
//! 积木层传入的都是字符串参数，这里负责按板卡菜单校验并转换为强类型。

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 引脚种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PinKind {
    Digital,
    Analog,
}

impl PinKind {
    /// 遥测 payload 中的键前缀
    pub fn key_prefix(self) -> &'static str {
        match self {
            PinKind::Digital => "digital_pin_",
            PinKind::Analog => "analog_pin_",
        }
    }
}

/// 引脚复合键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin {
    pub kind: PinKind,
    pub index: u8,
}

impl Pin {
    pub const fn digital(index: u8) -> Self {
        Self {
            kind: PinKind::Digital,
            index,
        }
    }

    pub const fn analog(index: u8) -> Self {
        Self {
            kind: PinKind::Analog,
            index,
        }
    }

    /// 遥测 payload 中对应的键，如 `digital_pin_12`、`analog_pin_0`
    pub fn state_key(&self) -> String {
        format!("{}{}", self.kind.key_prefix(), self.index)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PinKind::Digital => write!(f, "D{}", self.index),
            PinKind::Analog => write!(f, "A{}", self.index),
        }
    }
}

/// 数字引脚（LED、按钮）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitalPin(pub u8);

/// 模拟输入引脚
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalogPin(pub u8);

/// 支持 PWM 的数字引脚（PWM LED、舵机）
///
/// 与 [`DigitalPin`] 共享同一个登记键：同一物理引脚切换用途时需要重新配置模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PwmPin(pub u8);

impl DigitalPin {
    pub fn pin(self) -> Pin {
        Pin::digital(self.0)
    }
}

impl AnalogPin {
    pub fn pin(self) -> Pin {
        Pin::analog(self.0)
    }
}

impl PwmPin {
    pub fn pin(self) -> Pin {
        Pin::digital(self.0)
    }
}

/// 逻辑电平
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicState {
    Low = 0,
    High = 1,
}

impl LogicState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<bool> for LogicState {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl FromStr for LogicState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Self::Low),
            "1" => Ok(Self::High),
            other => Err(ProtocolError::invalid("logicState", other)),
        }
    }
}

impl fmt::Display for LogicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// 板卡引脚菜单
///
/// 默认值对应 Arduino Nano：数字 2–13、模拟 0–7、PWM {3,5,6,9,10,11}。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLayout {
    /// 可用数字引脚
    pub digital_pins: Vec<u8>,
    /// 可用模拟引脚
    pub analog_pins: Vec<u8>,
    /// 支持 PWM 的引脚
    pub pwm_pins: Vec<u8>,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            digital_pins: (2..=13).collect(),
            analog_pins: (0..=7).collect(),
            pwm_pins: vec![3, 5, 6, 9, 10, 11],
        }
    }
}

impl BoardLayout {
    /// 解析数字引脚参数（`digitalPinNumber` 菜单）
    pub fn parse_digital(&self, value: &str) -> Result<DigitalPin, ProtocolError> {
        parse_menu_pin("digitalPinNumber", value, &self.digital_pins).map(DigitalPin)
    }

    /// 解析模拟引脚参数（`analogPinNumber` 菜单）
    pub fn parse_analog(&self, value: &str) -> Result<AnalogPin, ProtocolError> {
        parse_menu_pin("analogPinNumber", value, &self.analog_pins).map(AnalogPin)
    }

    /// 解析 PWM 引脚参数（`PwmPinNumber` 菜单）
    pub fn parse_pwm(&self, value: &str) -> Result<PwmPin, ProtocolError> {
        parse_menu_pin("PwmPinNumber", value, &self.pwm_pins).map(PwmPin)
    }

    /// 所有可登记的引脚（数字 + 模拟）
    pub fn all_pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.digital_pins
            .iter()
            .map(|&i| Pin::digital(i))
            .chain(self.analog_pins.iter().map(|&i| Pin::analog(i)))
    }
}

fn parse_menu_pin(field: &str, value: &str, menu: &[u8]) -> Result<u8, ProtocolError> {
    let trimmed = value.trim();
    match trimmed.parse::<u8>() {
        Ok(index) if menu.contains(&index) => Ok(index),
        _ => Err(ProtocolError::invalid(field, trimmed)),
    }
}

/// 解析数值字符串（PWM 值、舵机角度）
///
/// 只校验是否为有限数值并四舍五入为整数，不做范围限制（由适配器负责钳位）。
pub fn parse_numeric(field: &str, value: &str) -> Result<i64, ProtocolError> {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(v.round() as i64),
        _ => Err(ProtocolError::invalid(field, trimmed)),
    }
}
