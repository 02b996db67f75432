//! 驱动层错误类型定义

use eim_channel::ChannelError;
use eim_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 读取时没有遥测数据不是错误（返回 `None`），未知主题的帧只记录日志。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 通道错误（包括无可用连接）
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 协议错误（积木参数、命令字符串）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 会话事件循环已退出
    #[error("Session closed")]
    SessionClosed,

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// 命令是否因为没有可用连接而被拒绝
    pub fn is_channel_unavailable(&self) -> bool {
        matches!(self, DriverError::Channel(ChannelError::Unavailable))
    }
}

impl From<toml::de::Error> for DriverError {
    fn from(e: toml::de::Error) -> Self {
        DriverError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DriverError {
    fn from(e: toml::ser::Error) -> Self {
        DriverError::Config(e.to_string())
    }
}
