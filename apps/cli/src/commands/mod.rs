//! 命令定义和实现

pub mod block;
pub mod config;

pub use block::{Verb, WaitArgs};
pub use config::{ConfigCommand, load_config};
