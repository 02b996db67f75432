//! 积木命令
//!
//! 命令行与 Shell 共用：参数按积木菜单校验后转换为 [`Block`]。

use anyhow::Result;
use clap::Args;
use eim_protocol::{Block, BlockArgs, BoardLayout};

/// 读取类命令的等待参数
#[derive(Args, Debug, Clone, Copy)]
pub struct WaitArgs {
    /// 等待遥测的最长时间（毫秒），期间反复读取
    #[arg(long, default_value_t = 1000)]
    pub wait_ms: u64,
}

/// Shell 与命令行共用的动词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Led,
    Pwm,
    Servo,
    ReadAnalog,
    ReadButton,
}

impl Verb {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "led" => Some(Verb::Led),
            "pwm" => Some(Verb::Pwm),
            "servo" => Some(Verb::Servo),
            "read-analog" => Some(Verb::ReadAnalog),
            "read-button" => Some(Verb::ReadButton),
            _ => None,
        }
    }

    fn opcode(self) -> &'static str {
        match self {
            Verb::Led => Block::CHANGE_LED_STATE,
            Verb::Pwm => Block::CHANGE_PWM_LED_VALUE,
            Verb::Servo => Block::CHANGE_SERVO_DEGREE,
            Verb::ReadAnalog => Block::READ_ANALOG_VALUE,
            Verb::ReadButton => Block::READ_BUTTON_STATE,
        }
    }

    /// 位置参数对应的积木参数名
    fn argument_names(self) -> &'static [&'static str] {
        match self {
            Verb::Led => &["digitalPinNumber", "logicState"],
            Verb::Pwm => &["PwmPinNumber", "pwmValue"],
            Verb::Servo => &["PwmPinNumber", "degree"],
            Verb::ReadAnalog => &["analogPinNumber"],
            Verb::ReadButton => &["digitalPinNumber"],
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Verb::Led => "led <pin> <0|1>",
            Verb::Pwm => "pwm <pin> <value>",
            Verb::Servo => "servo <pin> <degree>",
            Verb::ReadAnalog => "read-analog <pin>",
            Verb::ReadButton => "read-button <pin>",
        }
    }

    /// 按位置参数构造积木
    pub fn to_block(self, values: &[&str], layout: &BoardLayout) -> Result<Block> {
        let names = self.argument_names();
        if values.len() != names.len() {
            anyhow::bail!("用法: {}", self.usage());
        }

        let args: BlockArgs = names.iter().copied().zip(values.iter().copied()).collect();
        Ok(Block::from_opcode(self.opcode(), &args, layout)?)
    }
}
