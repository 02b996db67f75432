//! # EIM CLI
//!
//! Command-line interface for the EIM Arduino block bridge.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 点亮 13 号引脚 LED（内部：连接 -> 配置模式 -> 写入 -> 等待稳定 -> 断开）
//! eim-cli led 13 1
//!
//! # 读取模拟引脚 A0，最多等待 2 秒
//! eim-cli read-analog 0 --wait-ms 2000
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ eim-cli shell
//! eim> servo 9 90
//! eim> read-button 12
//! eim> mode D9
//! eim> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod modes;

use commands::{ConfigCommand, Verb, WaitArgs, load_config};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// EIM CLI - Arduino 积木桥接命令行工具
#[derive(Parser, Debug)]
#[command(name = "eim-cli")]
#[command(about = "Command-line interface for the EIM Arduino block bridge", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 <config_dir>/eim-bridge/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 适配器主机（覆盖配置文件）
    #[arg(long, global = true)]
    host: Option<String>,

    /// 适配器端口（覆盖配置文件）
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// 命令完成后发送 quit!，让适配器断开板卡
    #[arg(long, global = true)]
    quit: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 设置 LED（数字输出）
    Led {
        /// 数字引脚（2-13）
        pin: String,
        /// 逻辑电平（0 或 1）
        state: String,
    },

    /// 设置 PWM 占空比
    Pwm {
        /// PWM 引脚（3, 5, 6, 9, 10, 11）
        pin: String,
        /// 占空比（由适配器限制范围）
        value: String,
    },

    /// 设置舵机角度
    Servo {
        /// PWM 引脚（3, 5, 6, 9, 10, 11）
        pin: String,
        /// 角度
        degree: String,
    },

    /// 读取模拟引脚
    ReadAnalog {
        /// 模拟引脚（0-7）
        pin: String,
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// 读取按钮（数字输入）
    ReadButton {
        /// 数字引脚（2-13）
        pin: String,
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// 打印适配器遥测，直到 Ctrl+C
    Monitor,

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

impl Commands {
    /// 积木命令：动词 + 位置参数 + 读取等待时间
    fn as_block(&self) -> Option<(Verb, Vec<&str>, Duration)> {
        let none = Duration::ZERO;
        match self {
            Commands::Led { pin, state } => {
                Some((Verb::Led, vec![pin.as_str(), state.as_str()], none))
            },
            Commands::Pwm { pin, value } => {
                Some((Verb::Pwm, vec![pin.as_str(), value.as_str()], none))
            },
            Commands::Servo { pin, degree } => {
                Some((Verb::Servo, vec![pin.as_str(), degree.as_str()], none))
            },
            Commands::ReadAnalog { pin, wait } => Some((
                Verb::ReadAnalog,
                vec![pin.as_str()],
                Duration::from_millis(wait.wait_ms),
            )),
            Commands::ReadButton { pin, wait } => Some((
                Verb::ReadButton,
                vec![pin.as_str()],
                Duration::from_millis(wait.wait_ms),
            )),
            Commands::Config(_) | Commands::Monitor | Commands::Shell => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eim_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.adapter.host = host;
    }
    if let Some(port) = cli.port {
        config.adapter.port = port;
    }

    // 参数在连接之前校验
    if let Some((verb, values, wait)) = cli.command.as_block() {
        let block = verb.to_block(&values, &config.board)?;
        return OneShotMode::new(config, cli.quit).execute(block, wait).await;
    }

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config),

        Commands::Monitor => OneShotMode::new(config, cli.quit).monitor().await,

        Commands::Shell => run_repl(config).await,

        _ => Ok(()),
    }
}
