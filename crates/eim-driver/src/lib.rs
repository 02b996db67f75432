//! # EIM Driver
//!
//! 积木层与 Arduino 适配器之间的引脚状态协调与命令分派。
//!
//! ## 组成
//!
//! - [`PinStateRegistry`]：每个引脚最后一次配置的模式（纯内存）
//! - [`TelemetryCache`]：按主题保存最近一帧遥测，按引脚键读取
//! - [`PinCommandDispatcher`]：模式协调 + 数据命令，写操作返回 [`Settlement`]
//! - [`Session`] / [`SessionHandle`]：单任务事件循环，串行处理遥测与积木请求
//! - [`BridgeConfig`]：TOML 配置
//!
//! ## 控制流
//!
//! ```text
//! 积木调用 → Dispatcher 查询/更新 Registry → Channel.send(命令)
//! 适配器 → 遥测帧 → Dispatcher.handle_frame → TelemetryCache → 读操作
//! ```
//!
//! 初始化主题（`eim/arduino/init`）的帧会把所有引脚重置为 `Unconfigured`，
//! 之后的操作会重新发送模式配置命令。

pub mod config;
pub mod dispatcher;
mod error;
pub mod registry;
pub mod session;
pub mod settlement;
pub mod telemetry;

pub use config::{AdapterConfig, BridgeConfig, ReadPolicy, Topics, DEFAULT_SETTLEMENT_DELAY_MS};
pub use dispatcher::{BlockOutcome, PinCommandDispatcher};
pub use error::DriverError;
pub use registry::PinStateRegistry;
pub use session::{BlockResponse, Session, SessionHandle};
pub use settlement::{Settled, Settlement, SettlementState};
pub use telemetry::{TelemetryCache, TopicKind};
