//! 分派器集成测试
//!
//! 使用 MockChannel 记录出站命令，SimulatedBoard 执行命令并回传遥测帧，
//! 覆盖模式协调、会话重置、遥测新鲜度和写入稳定的端到端行为。

use eim_channel::{MockChannel, SimulatedBoard};
use eim_driver::{
    BlockOutcome, BridgeConfig, PinCommandDispatcher, ReadPolicy, SettlementState, TopicKind,
};
use eim_protocol::{
    AnalogPin, Block, BlockArgs, BoardCommand, BoardLayout, DigitalPin, LogicState, ModeConstant,
    Pin, PinMode, PwmPin, TelemetryFrame, TelemetryValue,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn dispatcher() -> (PinCommandDispatcher<MockChannel>, MockChannel) {
    let channel = MockChannel::new();
    (PinCommandDispatcher::with_defaults(channel.clone()), channel)
}

/// 把已发送的命令交给模拟板卡，再把板卡的遥测帧交回分派器
fn pump(
    dispatcher: &mut PinCommandDispatcher<MockChannel>,
    channel: &MockChannel,
    board: &mut SimulatedBoard,
) {
    for message in channel.take_sent() {
        board.apply(&message).unwrap();
    }
    for frame in board.poll() {
        dispatcher.handle_frame(frame);
    }
}

#[tokio::test]
async fn test_end_to_end_led_scenario() {
    let (mut dispatcher, channel) = dispatcher();
    assert_eq!(dispatcher.pin_mode(Pin::digital(13)), PinMode::Unconfigured);

    dispatcher
        .change_led_state(DigitalPin(13), LogicState::High)
        .unwrap();
    assert_eq!(
        channel.take_sent_commands(),
        vec![
            BoardCommand::SetPinMode {
                pin: 13,
                mode: ModeConstant::Output
            },
            BoardCommand::DigitalWrite {
                pin: 13,
                state: LogicState::High
            },
        ]
    );
    assert_eq!(dispatcher.pin_mode(Pin::digital(13)), PinMode::DigitalOutput);

    dispatcher
        .change_led_state(DigitalPin(13), LogicState::Low)
        .unwrap();
    assert_eq!(
        channel.take_sent_commands(),
        vec![BoardCommand::DigitalWrite {
            pin: 13,
            state: LogicState::Low
        }]
    );
}

#[tokio::test]
async fn test_first_use_emits_config_then_data_for_every_write() {
    let cases: [(&str, BlockArgs); 3] = [
        (
            "changeLedState",
            BlockArgs::new()
                .with("digitalPinNumber", "7")
                .with("logicState", "1"),
        ),
        (
            "changePwmLedValue",
            BlockArgs::new()
                .with("PwmPinNumber", "5")
                .with("pwmValue", "200"),
        ),
        (
            "changeServoDegree",
            BlockArgs::new()
                .with("PwmPinNumber", "6")
                .with("degree", "45"),
        ),
    ];

    for (opcode, args) in cases {
        let (mut dispatcher, channel) = dispatcher();
        let block = Block::from_opcode(opcode, &args, &BoardLayout::default()).unwrap();

        let settlement = dispatcher.execute(block).unwrap().into_settlement().unwrap();
        let sent = channel.take_sent_commands();
        assert_eq!(sent.len(), 2, "{}", opcode);
        assert!(sent[0].is_mode_config(), "{}: {:?}", opcode, sent);
        assert!(!sent[1].is_mode_config(), "{}: {:?}", opcode, sent);
        assert_eq!(settlement.commands().as_slice(), sent.as_slice());

        dispatcher.execute(block).unwrap();
        assert_eq!(channel.take_sent_commands().len(), 1, "{}", opcode);
    }
}

#[test]
fn test_reset_on_session_start() {
    let (mut dispatcher, channel) = dispatcher();
    dispatcher.read_button_state(DigitalPin(2)).unwrap();
    dispatcher.read_button_state(DigitalPin(3)).unwrap();
    dispatcher.read_analog_value(AnalogPin(0)).unwrap();
    assert_eq!(dispatcher.registry().configured_count(), 3);
    channel.take_sent();

    let kind = dispatcher.handle_frame(SimulatedBoard::init_frame());
    assert_eq!(kind, TopicKind::Init);
    assert_eq!(dispatcher.registry().configured_count(), 0);

    dispatcher.read_button_state(DigitalPin(2)).unwrap();
    dispatcher.read_analog_value(AnalogPin(0)).unwrap();
    assert_eq!(
        channel.take_payloads(),
        vec![
            "board.set_pin_mode(2, Constants.INPUT)",
            "board.set_pin_mode(0, Constants.ANALOG)",
        ]
    );
}

#[test]
fn test_registry_seeded_mode_skips_configuration() {
    let (mut dispatcher, channel) = dispatcher();
    let previous = dispatcher
        .registry_mut()
        .set_mode(Pin::digital(13), PinMode::DigitalOutput);
    assert_eq!(previous, PinMode::Unconfigured);

    let _ = dispatcher
        .change_led_state(DigitalPin(13), LogicState::High)
        .unwrap();
    assert_eq!(channel.take_payloads(), vec!["board.digital_write(13,1)"]);

    // 同一引脚改作输入：模式不同，需要重新配置
    dispatcher.read_button_state(DigitalPin(13)).unwrap();
    assert_eq!(
        channel.take_payloads(),
        vec!["board.set_pin_mode(13, Constants.INPUT)"]
    );
}

#[test]
fn test_telemetry_freshness() {
    let (mut dispatcher, _channel) = dispatcher();
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"analog_pin_0": 10}),
    ));
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"analog_pin_0": 20}),
    ));

    assert_eq!(
        dispatcher.read_analog_value(AnalogPin(0)).unwrap(),
        Some(TelemetryValue::Integer(20))
    );
}

#[test]
fn test_no_stale_cross_topic_reads() {
    let (mut dispatcher, _channel) = dispatcher();
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"analog_pin_0": 10, "digital_pin_12": 1}),
    ));
    let kind = dispatcher.handle_frame(TelemetryFrame::new(
        "eim/microbit",
        json!({"analog_pin_0": 99, "digital_pin_12": 0}),
    ));
    assert_eq!(kind, TopicKind::Unrecognized);

    assert_eq!(dispatcher.read_analog_value(AnalogPin(0)).unwrap(), None);
    assert_eq!(dispatcher.read_button_state(DigitalPin(12)).unwrap(), None);
}

#[test]
fn test_latest_on_topic_policy() {
    let config = BridgeConfig {
        read_policy: ReadPolicy::LatestOnTopic,
        ..BridgeConfig::default()
    };
    let mut dispatcher = PinCommandDispatcher::new(MockChannel::new(), &config);
    assert_eq!(dispatcher.telemetry().policy(), ReadPolicy::LatestOnTopic);
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"analog_pin_0": 10}),
    ));
    dispatcher.handle_frame(TelemetryFrame::new("eim/microbit", json!({})));

    assert_eq!(
        dispatcher.read_analog_value(AnalogPin(0)).unwrap(),
        Some(TelemetryValue::Integer(10))
    );
}

#[tokio::test(start_paused = true)]
async fn test_settlement_timing_ignores_telemetry() {
    let (mut dispatcher, _channel) = dispatcher();
    let start = Instant::now();

    let settlement = dispatcher
        .change_led_state(DigitalPin(13), LogicState::High)
        .unwrap();
    assert_eq!(settlement.state(), SettlementState::Sent);

    // 遥测活动不会提前完成稳定等待
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"digital_pin_13": 1}),
    ));
    assert_eq!(settlement.state(), SettlementState::Sent);

    assert_eq!(settlement.await, SettlementState::PresumedApplied);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_configured_settlement_delay() {
    let config = BridgeConfig {
        settlement_delay_ms: 250,
        ..BridgeConfig::default()
    };
    let mut dispatcher = PinCommandDispatcher::new(MockChannel::new(), &config);
    let start = Instant::now();

    dispatcher
        .change_servo_degree(PwmPin(10), 180)
        .unwrap()
        .await;
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_against_simulated_board() {
    let (mut dispatcher, channel) = dispatcher();
    let mut board = SimulatedBoard::new();

    // 板卡首轮发布初始化帧
    pump(&mut dispatcher, &channel, &mut board);
    assert_eq!(dispatcher.telemetry().frames_seen(), 2);

    // 未配置前没有读数
    board.set_digital_input(12, LogicState::High);
    board.set_analog_input(0, 731);
    assert_eq!(dispatcher.read_button_state(DigitalPin(12)).unwrap(), None);
    assert_eq!(dispatcher.read_analog_value(AnalogPin(0)).unwrap(), None);

    pump(&mut dispatcher, &channel, &mut board);
    assert_eq!(
        dispatcher.read_button_state(DigitalPin(12)).unwrap(),
        Some(TelemetryValue::Integer(1))
    );
    assert_eq!(
        dispatcher.read_analog_value(AnalogPin(0)).unwrap(),
        Some(TelemetryValue::Integer(731))
    );
    assert!(channel.sent().is_empty());

    dispatcher.change_pwm_led_value(PwmPin(9), 50).unwrap();
    pump(&mut dispatcher, &channel, &mut board);
    assert_eq!(board.pwm_value(9), Some(50));
    let report = dispatcher.telemetry().pin_report(9).unwrap();
    assert_eq!(report.mode.pin_mode(), Some(PinMode::PwmOutput));
    assert_eq!(dispatcher.telemetry().last_output().as_deref(), Some("None"));

    // 适配器重启：下一轮操作重新配置
    board.power_cycle();
    pump(&mut dispatcher, &channel, &mut board);
    assert_eq!(dispatcher.pin_mode(Pin::digital(9)), PinMode::Unconfigured);

    dispatcher.change_pwm_led_value(PwmPin(9), 60).unwrap();
    assert_eq!(
        channel.take_payloads(),
        vec![
            "board.set_pin_mode(9, Constants.PWM)",
            "board.analog_write(9,60)"
        ]
    );
}

#[test]
fn test_channel_unavailable_rejects_write() {
    let (mut dispatcher, channel) = dispatcher();
    channel.set_online(false);

    let err = dispatcher
        .change_led_state(DigitalPin(13), LogicState::High)
        .unwrap_err();
    assert!(err.is_channel_unavailable());
    assert_eq!(dispatcher.pin_mode(Pin::digital(13)), PinMode::Unconfigured);
    assert!(channel.sent().is_empty());
}

#[test]
fn test_execute_reporter_returns_value() {
    let (mut dispatcher, _channel) = dispatcher();
    dispatcher.read_button_state(DigitalPin(4)).unwrap();
    dispatcher.handle_frame(TelemetryFrame::new(
        "eim/arduino",
        json!({"digital_pin_4": 0}),
    ));

    let outcome = dispatcher
        .execute(Block::ReadButtonState { pin: DigitalPin(4) })
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Value(_)));
    assert_eq!(outcome.into_value(), Some(TelemetryValue::Integer(0)));
}
