//! # EIM Channel
//!
//! 主题寻址的消息通道抽象：桥接层通过 `send(topic, payload)` 下发命令，
//! 适配器以 `message(topic, payload)` 事件回传遥测。
//!
//! 连接生命周期（发现、重连、握手）由通道实现自行负责，不属于桥接核心的契约。

use eim_protocol::{OutboundMessage, ProtocolError};
use thiserror::Error;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub use tcp::{ChannelSender, InboundFrames, TcpTransport};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockChannel, SimulatedBoard};

/// 通道错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 没有可用连接（命令未发出，而不是静默丢弃）
    #[error("Channel unavailable: no live connection to the adapter")]
    Unavailable,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// 出站消息通道
///
/// 只负责投递，不提供确认：返回 `Ok` 仅代表消息已交给传输层。
pub trait Channel {
    fn send(&mut self, message: OutboundMessage) -> Result<(), ChannelError>;

    /// 连接当前是否可用
    fn is_connected(&self) -> bool {
        true
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, message: OutboundMessage) -> Result<(), ChannelError> {
        (**self).send(message)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_display() {
        let msg = ChannelError::Unavailable.to_string();
        assert!(msg.contains("unavailable"), "message: {}", msg);

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: ChannelError = io.into();
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[test]
    fn test_boxed_channel_forwards() {
        let mock = MockChannel::new();
        let mut boxed: Box<dyn Channel> = Box::new(mock.clone());
        let msg = OutboundMessage {
            topic: "eim/arduino".into(),
            payload: "board.servo_config(9)".into(),
        };
        boxed.send(msg.clone()).unwrap();
        assert_eq!(mock.sent(), vec![msg]);

        mock.set_online(false);
        assert!(!boxed.is_connected());
    }
}
