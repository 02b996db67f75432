//! 引脚命令分派器
//!
//! 每个积木操作分两步执行：
//!
//! 1. **模式协调**：登记表中的模式与目标模式不同时，先更新登记表，再发送模式配置命令
//!    （舵机使用 `servo_config`，其余使用 `set_pin_mode`）。
//! 2. **数据命令**：写操作发送 `digital_write` / `analog_write` 并返回 [`Settlement`]；
//!    读操作不发送数据命令，直接从遥测缓存读取快照。
//!
//! 分派器本身是同步的，不持有锁；遥测帧通过 [`PinCommandDispatcher::handle_frame`]
//! 在同一执行上下文中按到达顺序应用。

use crate::config::BridgeConfig;
use crate::error::DriverError;
use crate::registry::PinStateRegistry;
use crate::settlement::Settlement;
use crate::telemetry::{TelemetryCache, TopicKind};
use eim_channel::Channel;
use eim_protocol::{
    AnalogPin, Block, BoardCommand, CommandBatch, DigitalPin, LogicState, OutboundMessage, Pin,
    PinMode, PwmPin, TelemetryFrame, TelemetryValue,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 积木执行结果
#[derive(Debug)]
pub enum BlockOutcome {
    /// 报告型积木的读数（`None` 表示暂无遥测，调用方应稍后重试）
    Value(Option<TelemetryValue>),
    /// 命令型积木的稳定句柄
    Pending(Settlement),
}

impl BlockOutcome {
    pub fn into_value(self) -> Option<TelemetryValue> {
        match self {
            BlockOutcome::Value(value) => value,
            BlockOutcome::Pending(_) => None,
        }
    }

    pub fn into_settlement(self) -> Option<Settlement> {
        match self {
            BlockOutcome::Pending(settlement) => Some(settlement),
            BlockOutcome::Value(_) => None,
        }
    }
}

/// 引脚命令分派器
///
/// 独占持有通道、登记表和遥测缓存，每个连接一份。
pub struct PinCommandDispatcher<C: Channel> {
    channel: C,
    registry: PinStateRegistry,
    telemetry: TelemetryCache,
    command_topic: String,
    settlement_delay: Duration,
}

impl<C: Channel> PinCommandDispatcher<C> {
    pub fn new(channel: C, config: &BridgeConfig) -> Self {
        Self {
            channel,
            registry: PinStateRegistry::new(),
            telemetry: TelemetryCache::new(config.topics.clone(), config.read_policy),
            command_topic: config.topics.command.clone(),
            settlement_delay: config.settlement_delay(),
        }
    }

    /// 使用默认配置（`eim/arduino` 主题，100ms 稳定延时）
    pub fn with_defaults(channel: C) -> Self {
        Self::new(channel, &BridgeConfig::default())
    }

    pub fn registry(&self) -> &PinStateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PinStateRegistry {
        &mut self.registry
    }

    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn settlement_delay(&self) -> Duration {
        self.settlement_delay
    }

    pub fn pin_mode(&self, pin: Pin) -> PinMode {
        self.registry.get_mode(pin)
    }

    /// 读取模拟量
    pub fn read_analog_value(
        &mut self,
        pin: AnalogPin,
    ) -> Result<Option<TelemetryValue>, DriverError> {
        self.reconcile(pin.pin(), PinMode::AnalogInput)?;
        Ok(self.telemetry.read(pin.pin()))
    }

    /// 读取按钮（数字输入）
    pub fn read_button_state(
        &mut self,
        pin: DigitalPin,
    ) -> Result<Option<TelemetryValue>, DriverError> {
        self.reconcile(pin.pin(), PinMode::DigitalInput)?;
        Ok(self.telemetry.read(pin.pin()))
    }

    /// 设置 LED（数字输出）
    pub fn change_led_state(
        &mut self,
        pin: DigitalPin,
        state: LogicState,
    ) -> Result<Settlement, DriverError> {
        self.write(
            pin.pin(),
            PinMode::DigitalOutput,
            BoardCommand::DigitalWrite { pin: pin.0, state },
        )
    }

    /// 设置 PWM 占空比（范围由适配器负责限制）
    pub fn change_pwm_led_value(
        &mut self,
        pin: PwmPin,
        value: i64,
    ) -> Result<Settlement, DriverError> {
        self.write(
            pin.pin(),
            PinMode::PwmOutput,
            BoardCommand::AnalogWrite { pin: pin.0, value },
        )
    }

    /// 设置舵机角度
    pub fn change_servo_degree(
        &mut self,
        pin: PwmPin,
        degree: i64,
    ) -> Result<Settlement, DriverError> {
        self.write(
            pin.pin(),
            PinMode::ServoOutput,
            BoardCommand::AnalogWrite {
                pin: pin.0,
                value: degree,
            },
        )
    }

    /// 执行一个积木请求
    pub fn execute(&mut self, block: Block) -> Result<BlockOutcome, DriverError> {
        let outcome = match block {
            Block::ReadAnalogValue { pin } => BlockOutcome::Value(self.read_analog_value(pin)?),
            Block::ReadButtonState { pin } => BlockOutcome::Value(self.read_button_state(pin)?),
            Block::ChangeLedState { pin, state } => {
                BlockOutcome::Pending(self.change_led_state(pin, state)?)
            },
            Block::ChangePwmLedValue { pin, value } => {
                BlockOutcome::Pending(self.change_pwm_led_value(pin, value)?)
            },
            Block::ChangeServoDegree { pin, degree } => {
                BlockOutcome::Pending(self.change_servo_degree(pin, degree)?)
            },
        };
        Ok(outcome)
    }

    /// 应用一帧遥测
    ///
    /// 初始化主题的帧表示适配器会话重新开始，所有引脚回到 `Unconfigured`。
    pub fn handle_frame(&mut self, frame: TelemetryFrame) -> TopicKind {
        let kind = self.telemetry.ingest(frame);
        if kind == TopicKind::Init {
            info!(
                "Adapter session started, resetting {} configured pin(s)",
                self.registry.configured_count()
            );
            self.registry.reset();
        }
        kind
    }

    /// 请求适配器断开板卡
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        self.send(BoardCommand::Shutdown)
    }

    fn write(
        &mut self,
        pin: Pin,
        mode: PinMode,
        data: BoardCommand,
    ) -> Result<Settlement, DriverError> {
        let mut commands = CommandBatch::new();
        if let Some(config) = self.reconcile(pin, mode)? {
            commands.push(config);
        }
        self.send(data)?;
        commands.push(data);
        Ok(Settlement::new(self.settlement_delay, commands))
    }

    /// 模式协调：需要时发送模式配置命令，返回发出的命令
    ///
    /// 登记表先于发送更新；发送失败时恢复为之前的模式。
    fn reconcile(&mut self, pin: Pin, mode: PinMode) -> Result<Option<BoardCommand>, DriverError> {
        if self.registry.get_mode(pin) == mode {
            return Ok(None);
        }

        let command = match (mode, mode.mode_constant()) {
            (PinMode::ServoOutput, _) => BoardCommand::ServoConfig { pin: pin.index },
            (_, Some(constant)) => BoardCommand::SetPinMode {
                pin: pin.index,
                mode: constant,
            },
            (_, None) => return Ok(None),
        };

        let previous = self.registry.set_mode(pin, mode);
        if let Err(e) = self.send(command) {
            warn!("Failed to configure {} as {}: {}", pin, mode, e);
            self.registry.set_mode(pin, previous);
            return Err(e);
        }
        Ok(Some(command))
    }

    fn send(&mut self, command: BoardCommand) -> Result<(), DriverError> {
        let message = OutboundMessage::new(self.command_topic.as_str(), &command);
        debug!("-> {} {}", message.topic, message.payload);
        self.channel.send(message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eim_channel::MockChannel;
    use eim_protocol::ModeConstant;
    use serde_json::json;

    fn dispatcher() -> (PinCommandDispatcher<MockChannel>, MockChannel) {
        let channel = MockChannel::new();
        (PinCommandDispatcher::with_defaults(channel.clone()), channel)
    }

    #[tokio::test]
    async fn test_first_write_configures_then_writes() {
        let (mut dispatcher, channel) = dispatcher();

        let settlement = dispatcher
            .change_led_state(DigitalPin(13), LogicState::High)
            .unwrap();

        assert_eq!(
            channel.take_payloads(),
            vec![
                "board.set_pin_mode(13, Constants.OUTPUT)",
                "board.digital_write(13,1)"
            ]
        );
        assert_eq!(settlement.commands().len(), 2);
        assert_eq!(
            dispatcher.pin_mode(Pin::digital(13)),
            PinMode::DigitalOutput
        );

        dispatcher
            .change_led_state(DigitalPin(13), LogicState::Low)
            .unwrap();
        assert_eq!(channel.take_payloads(), vec!["board.digital_write(13,0)"]);
    }

    #[tokio::test]
    async fn test_servo_uses_servo_config() {
        let (mut dispatcher, channel) = dispatcher();
        dispatcher.change_servo_degree(PwmPin(9), 90).unwrap();

        assert_eq!(
            channel.sent_commands(),
            vec![
                BoardCommand::ServoConfig { pin: 9 },
                BoardCommand::AnalogWrite { pin: 9, value: 90 }
            ]
        );
    }

    #[tokio::test]
    async fn test_switching_purpose_reconfigures() {
        let (mut dispatcher, channel) = dispatcher();
        dispatcher.change_pwm_led_value(PwmPin(9), 50).unwrap();
        dispatcher.change_servo_degree(PwmPin(9), 10).unwrap();
        dispatcher.change_pwm_led_value(PwmPin(9), 60).unwrap();

        let configs: Vec<_> = channel
            .sent_commands()
            .into_iter()
            .filter(BoardCommand::is_mode_config)
            .collect();
        assert_eq!(
            configs,
            vec![
                BoardCommand::SetPinMode {
                    pin: 9,
                    mode: ModeConstant::Pwm
                },
                BoardCommand::ServoConfig { pin: 9 },
                BoardCommand::SetPinMode {
                    pin: 9,
                    mode: ModeConstant::Pwm
                },
            ]
        );
    }

    #[test]
    fn test_read_sends_only_mode_config() {
        let (mut dispatcher, channel) = dispatcher();

        assert_eq!(dispatcher.read_analog_value(AnalogPin(0)).unwrap(), None);
        assert_eq!(
            channel.take_payloads(),
            vec!["board.set_pin_mode(0, Constants.ANALOG)"]
        );

        dispatcher.handle_frame(TelemetryFrame::new(
            "eim/arduino",
            json!({"analog_pin_0": 512}),
        ));
        assert_eq!(
            dispatcher.read_analog_value(AnalogPin(0)).unwrap(),
            Some(TelemetryValue::Integer(512))
        );
        assert!(channel.take_payloads().is_empty());
    }

    #[test]
    fn test_init_frame_resets_registry() {
        let (mut dispatcher, channel) = dispatcher();
        dispatcher.read_button_state(DigitalPin(12)).unwrap();
        channel.take_sent();

        let kind = dispatcher.handle_frame(TelemetryFrame::new("eim/arduino/init", json!("")));
        assert_eq!(kind, TopicKind::Init);
        assert_eq!(
            dispatcher.pin_mode(Pin::digital(12)),
            PinMode::Unconfigured
        );

        dispatcher.read_button_state(DigitalPin(12)).unwrap();
        assert_eq!(
            channel.take_payloads(),
            vec!["board.set_pin_mode(12, Constants.INPUT)"]
        );
    }

    #[test]
    fn test_unavailable_channel_restores_mode() {
        let (mut dispatcher, channel) = dispatcher();
        channel.set_online(false);

        let err = dispatcher.read_analog_value(AnalogPin(1)).unwrap_err();
        assert!(err.is_channel_unavailable());
        assert_eq!(dispatcher.pin_mode(Pin::analog(1)), PinMode::Unconfigured);

        channel.set_online(true);
        dispatcher.read_analog_value(AnalogPin(1)).unwrap();
        assert_eq!(
            channel.take_payloads(),
            vec!["board.set_pin_mode(1, Constants.ANALOG)"]
        );
    }

    #[test]
    fn test_shutdown_sends_quit() {
        let (mut dispatcher, channel) = dispatcher();
        dispatcher.shutdown().unwrap();
        assert_eq!(channel.take_payloads(), vec!["quit!"]);
    }
}
