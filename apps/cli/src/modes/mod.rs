//! 运行模式
//!
//! - `oneshot`: 单条命令，执行后断开
//! - `repl`: 交互式 Shell，保持会话

pub mod oneshot;
pub mod repl;
