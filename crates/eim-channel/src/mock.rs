//! Mock 通道与模拟适配器
//!
//! - [`MockChannel`]：记录所有出站消息，可切换为离线以模拟连接丢失
//! - [`SimulatedBoard`]：解释命令字符串并生成与真实适配器格式一致的遥测帧

use crate::{Channel, ChannelError};
use eim_protocol::{
    BoardCommand, FirmataMode, LogicState, ModeConstant, OutboundMessage, PinReport,
    ProtocolError, TelemetryFrame, COMMAND_TOPIC, INIT_TOPIC, SENSOR_TOPIC,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 记录型 Mock 通道
///
/// 克隆共享同一份记录，测试可以保留一个句柄用于断言。
#[derive(Debug, Clone)]
pub struct MockChannel {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    online: Arc<AtomicBool>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<OutboundMessage>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 切换在线状态（离线时 `send` 返回 `Unavailable`）
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// 已发送消息的快照
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.records().clone()
    }

    /// 取出并清空已发送消息
    pub fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.records())
    }

    /// 取出并清空已发送消息的 payload 字符串
    pub fn take_payloads(&self) -> Vec<String> {
        self.take_sent().into_iter().map(|m| m.payload).collect()
    }

    /// 已发送消息解析后的命令
    pub fn sent_commands(&self) -> Vec<BoardCommand> {
        self.sent()
            .iter()
            .filter_map(|m| m.command().ok())
            .collect()
    }

    /// 取出并清空已发送消息，返回解析后的命令
    pub fn take_sent_commands(&self) -> Vec<BoardCommand> {
        self.take_sent()
            .iter()
            .filter_map(|m| m.command().ok())
            .collect()
    }
}

impl Channel for MockChannel {
    fn send(&mut self, message: OutboundMessage) -> Result<(), ChannelError> {
        if !self.online.load(Ordering::Relaxed) {
            return Err(ChannelError::Unavailable);
        }
        self.records().push(message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

/// 模拟适配器 + 板卡
///
/// 行为近似真实适配器：
/// - 首次轮询前发布一次 `eim/arduino/init`
/// - 每帧包含 `pin_<n>_state`、`digital_pin_<n>`、`analog_pin_<n>` 和上一条命令的 `output`
/// - 数字引脚未配置时读数为 `null`；模拟引脚仅在 ANALOG 模式下报告读数
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    modes: BTreeMap<u8, FirmataMode>,
    digital_levels: BTreeMap<u8, i64>,
    analog_levels: BTreeMap<u8, i64>,
    analog_modes: BTreeMap<u8, bool>,
    pwm_values: BTreeMap<u8, i64>,
    last_output: String,
    announced: bool,
    shut_down: bool,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBoard {
    pub const DIGITAL_PINS: std::ops::RangeInclusive<u8> = 2..=13;
    pub const ANALOG_PINS: std::ops::RangeInclusive<u8> = 0..=7;

    pub fn new() -> Self {
        Self {
            modes: BTreeMap::new(),
            digital_levels: BTreeMap::new(),
            analog_levels: BTreeMap::new(),
            analog_modes: BTreeMap::new(),
            pwm_values: BTreeMap::new(),
            last_output: "None".to_string(),
            announced: false,
            shut_down: false,
        }
    }

    /// 执行一条出站消息（非命令主题的消息被忽略）
    pub fn apply(&mut self, message: &OutboundMessage) -> Result<(), ProtocolError> {
        if message.topic != COMMAND_TOPIC {
            return Ok(());
        }
        let command = message.command()?;
        self.execute(command);
        Ok(())
    }

    /// 执行一条命令
    pub fn execute(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::SetPinMode { pin, mode } => match mode {
                ModeConstant::Analog => {
                    self.analog_modes.insert(pin, true);
                },
                ModeConstant::Input => {
                    self.modes.insert(pin, FirmataMode::Input);
                },
                ModeConstant::Output => {
                    self.modes.insert(pin, FirmataMode::Output);
                },
                ModeConstant::Pwm => {
                    self.modes.insert(pin, FirmataMode::Pwm);
                },
            },
            BoardCommand::DigitalWrite { pin, state } => {
                self.digital_levels.insert(pin, i64::from(state.as_u8()));
            },
            BoardCommand::AnalogWrite { pin, value } => {
                self.pwm_values.insert(pin, value);
            },
            BoardCommand::ServoConfig { pin } => {
                self.modes.insert(pin, FirmataMode::Servo);
            },
            BoardCommand::Shutdown => {
                self.shut_down = true;
                self.last_output = "quit!".to_string();
                return;
            },
        }
        self.last_output = "None".to_string();
    }

    /// 模拟外部输入（按钮按下等）
    pub fn set_digital_input(&mut self, pin: u8, state: LogicState) {
        self.digital_levels.insert(pin, i64::from(state.as_u8()));
    }

    /// 模拟模拟量输入
    pub fn set_analog_input(&mut self, pin: u8, value: i64) {
        self.analog_levels.insert(pin, value);
    }

    pub fn mode(&self, pin: u8) -> Option<FirmataMode> {
        self.modes.get(&pin).copied()
    }

    pub fn digital_level(&self, pin: u8) -> Option<i64> {
        self.digital_levels.get(&pin).copied()
    }

    pub fn pwm_value(&self, pin: u8) -> Option<i64> {
        self.pwm_values.get(&pin).copied()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// 模拟适配器重启（板卡上电复位）
    pub fn power_cycle(&mut self) {
        *self = Self::new();
    }

    /// 初始化帧
    pub fn init_frame() -> TelemetryFrame {
        TelemetryFrame::new(INIT_TOPIC, Value::String(String::new()))
    }

    /// 轮询一次：首轮先返回初始化帧，随后返回传感器帧
    pub fn poll(&mut self) -> Vec<TelemetryFrame> {
        let mut frames = Vec::with_capacity(2);
        if !self.announced {
            self.announced = true;
            frames.push(Self::init_frame());
        }
        frames.push(self.sensor_frame());
        frames
    }

    /// 当前状态的传感器帧
    pub fn sensor_frame(&self) -> TelemetryFrame {
        let mut payload = Map::new();

        payload.insert("output".into(), Value::String(self.last_output.clone()));

        for pin in Self::DIGITAL_PINS {
            let mode = self.modes.get(&pin).copied();
            let report = match mode {
                Some(m) => Value::from(vec![
                    Value::from(pin),
                    Value::from(m as u8),
                    self.digital_levels
                        .get(&pin)
                        .or_else(|| self.pwm_values.get(&pin))
                        .map_or(Value::Null, |v| Value::from(*v)),
                ]),
                None => Value::Null,
            };
            payload.insert(PinReport::key(pin), report);

            let level = match mode {
                Some(_) => self
                    .digital_levels
                    .get(&pin)
                    .map_or(Value::from(0), |v| Value::from(*v)),
                None => Value::Null,
            };
            payload.insert(format!("digital_pin_{}", pin), level);
        }

        for pin in Self::ANALOG_PINS {
            let reading = if self.analog_modes.get(&pin).copied().unwrap_or(false) {
                Value::from(self.analog_levels.get(&pin).copied().unwrap_or(0))
            } else {
                Value::Null
            };
            payload.insert(format!("analog_pin_{}", pin), reading);
        }

        TelemetryFrame::new(SENSOR_TOPIC, Value::Object(payload))
    }
}
