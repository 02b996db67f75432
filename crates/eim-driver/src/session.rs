//! 会话事件循环
//!
//! [`Session`] 在单个 tokio 任务上独占分派器，按到达顺序串行处理两类事件：
//! 入站遥测帧和来自 [`SessionHandle`] 的积木请求。登记表与遥测缓存因此不需要锁。
//!
//! 写操作的稳定等待放在独立任务中完成，事件循环在等待期间继续应用遥测。
//!
//! ```no_run
//! # async fn demo() -> Result<(), eim_driver::DriverError> {
//! use eim_channel::TcpTransport;
//! use eim_driver::{PinCommandDispatcher, Session};
//! use eim_protocol::{DigitalPin, LogicState};
//!
//! let (sender, inbound) = TcpTransport::connect("127.0.0.1:12358").await?;
//! let (session, handle) = Session::new(PinCommandDispatcher::with_defaults(sender), inbound);
//! tokio::spawn(session.run());
//!
//! handle.change_led_state(DigitalPin(13), LogicState::High).await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::dispatcher::{BlockOutcome, PinCommandDispatcher};
use crate::error::DriverError;
use crate::settlement::SettlementState;
use eim_channel::Channel;
use eim_protocol::{
    AnalogPin, Block, DigitalPin, LogicState, Pin, PinMode, PwmPin, TelemetryFrame,
    TelemetryValue,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

/// 请求队列容量
const REQUEST_QUEUE_CAPACITY: usize = 32;

/// 积木请求的应答
#[derive(Debug, Clone, PartialEq)]
pub enum BlockResponse {
    Value(Option<TelemetryValue>),
    Settled(SettlementState),
}

#[derive(Debug)]
enum Request {
    Block {
        block: Block,
        reply: oneshot::Sender<Result<BlockResponse, DriverError>>,
    },
    PinMode {
        pin: Pin,
        reply: oneshot::Sender<PinMode>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
}

/// 单消费者事件循环
pub struct Session<C: Channel> {
    dispatcher: PinCommandDispatcher<C>,
    inbound: mpsc::UnboundedReceiver<TelemetryFrame>,
    requests: mpsc::Receiver<Request>,
}

impl<C: Channel + Send + 'static> Session<C> {
    pub fn new(
        dispatcher: PinCommandDispatcher<C>,
        inbound: mpsc::UnboundedReceiver<TelemetryFrame>,
    ) -> (Self, SessionHandle) {
        let (tx, requests) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let session = Self {
            dispatcher,
            inbound,
            requests,
        };
        (session, SessionHandle { tx })
    }

    /// 运行事件循环，直到收到关闭请求或所有句柄被丢弃
    ///
    /// 返回分派器，便于检查最终状态。
    pub async fn run(mut self) -> PinCommandDispatcher<C> {
        let mut inbound_open = true;

        loop {
            tokio::select! {
                // 已到达的遥测先于新请求处理
                biased;

                frame = self.inbound.recv(), if inbound_open => match frame {
                    Some(frame) => {
                        trace!("<- {}", frame.topic);
                        self.dispatcher.handle_frame(frame);
                    },
                    None => {
                        debug!("Inbound telemetry stream closed");
                        inbound_open = false;
                    },
                },
                request = self.requests.recv() => match request {
                    Some(Request::Block { block, reply }) => self.handle_block(block, reply),
                    Some(Request::PinMode { pin, reply }) => {
                        let _ = reply.send(self.dispatcher.pin_mode(pin));
                    },
                    Some(Request::Shutdown { reply }) => {
                        info!("Session shutting down");
                        let _ = reply.send(self.dispatcher.shutdown());
                        break;
                    },
                    None => {
                        debug!("All session handles dropped");
                        break;
                    },
                },
            }
        }

        self.dispatcher
    }

    fn handle_block(
        &mut self,
        block: Block,
        reply: oneshot::Sender<Result<BlockResponse, DriverError>>,
    ) {
        match self.dispatcher.execute(block) {
            Ok(BlockOutcome::Value(value)) => {
                let _ = reply.send(Ok(BlockResponse::Value(value)));
            },
            Ok(BlockOutcome::Pending(settlement)) => {
                tokio::spawn(async move {
                    let state = settlement.await;
                    let _ = reply.send(Ok(BlockResponse::Settled(state)));
                });
            },
            Err(e) => {
                let _ = reply.send(Err(e));
            },
        }
    }
}

/// 会话句柄
///
/// 可克隆，所有方法在事件循环退出后返回 [`DriverError::SessionClosed`]。
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
}

impl SessionHandle {
    pub async fn execute(&self, block: Block) -> Result<BlockResponse, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Block { block, reply }).await?;
        rx.await.map_err(|_| DriverError::SessionClosed)?
    }

    pub async fn read_analog_value(
        &self,
        pin: AnalogPin,
    ) -> Result<Option<TelemetryValue>, DriverError> {
        self.read(Block::ReadAnalogValue { pin }).await
    }

    pub async fn read_button_state(
        &self,
        pin: DigitalPin,
    ) -> Result<Option<TelemetryValue>, DriverError> {
        self.read(Block::ReadButtonState { pin }).await
    }

    pub async fn change_led_state(
        &self,
        pin: DigitalPin,
        state: LogicState,
    ) -> Result<SettlementState, DriverError> {
        self.write(Block::ChangeLedState { pin, state }).await
    }

    pub async fn change_pwm_led_value(
        &self,
        pin: PwmPin,
        value: i64,
    ) -> Result<SettlementState, DriverError> {
        self.write(Block::ChangePwmLedValue { pin, value }).await
    }

    pub async fn change_servo_degree(
        &self,
        pin: PwmPin,
        degree: i64,
    ) -> Result<SettlementState, DriverError> {
        self.write(Block::ChangeServoDegree { pin, degree }).await
    }

    /// 查询登记表中的引脚模式
    pub async fn pin_mode(&self, pin: Pin) -> Result<PinMode, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::PinMode { pin, reply }).await?;
        rx.await.map_err(|_| DriverError::SessionClosed)
    }

    /// 发送 `quit!` 并结束事件循环
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Shutdown { reply }).await?;
        rx.await.map_err(|_| DriverError::SessionClosed)?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn read(&self, block: Block) -> Result<Option<TelemetryValue>, DriverError> {
        match self.execute(block).await? {
            BlockResponse::Value(value) => Ok(value),
            BlockResponse::Settled(_) => Ok(None),
        }
    }

    async fn write(&self, block: Block) -> Result<SettlementState, DriverError> {
        match self.execute(block).await? {
            BlockResponse::Settled(state) => Ok(state),
            BlockResponse::Value(_) => Ok(SettlementState::PresumedApplied),
        }
    }

    async fn request(&self, request: Request) -> Result<(), DriverError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| DriverError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eim_channel::MockChannel;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn start() -> (
        SessionHandle,
        mpsc::UnboundedSender<TelemetryFrame>,
        MockChannel,
        tokio::task::JoinHandle<PinCommandDispatcher<MockChannel>>,
    ) {
        let channel = MockChannel::new();
        let (frames, inbound) = mpsc::unbounded_channel();
        let (session, handle) =
            Session::new(PinCommandDispatcher::with_defaults(channel.clone()), inbound);
        let task = tokio::spawn(session.run());
        (handle, frames, channel, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_settles_after_delay() {
        let (handle, _frames, channel, _task) = start();

        let start = Instant::now();
        let state = handle
            .change_led_state(DigitalPin(13), LogicState::High)
            .await
            .unwrap();

        assert_eq!(state, SettlementState::PresumedApplied);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(channel.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_applied_while_write_settles() {
        let (handle, frames, _channel, _task) = start();

        let writer = handle.clone();
        let pending = tokio::spawn(async move {
            writer.change_pwm_led_value(PwmPin(9), 128).await
        });
        tokio::task::yield_now().await;

        frames
            .send(TelemetryFrame::new("eim/arduino", json!({"analog_pin_0": 7})))
            .unwrap();
        let value = handle.read_analog_value(AnalogPin(0)).await.unwrap();
        assert_eq!(value, Some(TelemetryValue::Integer(7)));
        assert!(!pending.is_finished());

        assert_eq!(
            pending.await.unwrap().unwrap(),
            SettlementState::PresumedApplied
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let (handle, _frames, channel, task) = start();
        handle.read_button_state(DigitalPin(2)).await.unwrap();
        assert_eq!(handle.pin_mode(Pin::digital(2)).await.unwrap(), PinMode::DigitalInput);

        handle.shutdown().await.unwrap();
        let dispatcher = task.await.unwrap();
        assert_eq!(dispatcher.registry().configured_count(), 1);
        assert_eq!(channel.take_payloads().last().map(String::as_str), Some("quit!"));

        let err = handle.read_button_state(DigitalPin(2)).await.unwrap_err();
        assert!(matches!(err, DriverError::SessionClosed));
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_loop() {
        let (handle, frames, _channel, task) = start();
        drop(frames);
        drop(handle);
        let dispatcher = task.await.unwrap();
        assert_eq!(dispatcher.telemetry().frames_seen(), 0);
    }
}
