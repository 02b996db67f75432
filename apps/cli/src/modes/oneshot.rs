//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 连接适配器并启动会话
//! 3. 执行积木
//! 4. 断开连接（可选发送 `quit!`）

use anyhow::{Context, Result};
use eim_channel::TcpTransport;
use eim_driver::{BlockResponse, BridgeConfig, PinCommandDispatcher, Session, SessionHandle};
use eim_driver::{TelemetryCache, TopicKind};
use eim_protocol::{Block, TelemetryValue};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// 读取重试间隔
const READ_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// 连接适配器并在后台运行会话
pub async fn connect(config: &BridgeConfig) -> Result<SessionHandle> {
    let address = config.adapter.address();
    println!("⏳ 连接到适配器 {}...", address);

    let (sender, inbound) = TcpTransport::connect(address.as_str())
        .await
        .with_context(|| format!("无法连接到适配器 {}", address))?;
    let (session, handle) = Session::new(PinCommandDispatcher::new(sender, config), inbound);
    tokio::spawn(session.run());

    println!("✅ 已连接");
    Ok(handle)
}

/// 反复读取直到拿到读数或超时
///
/// 第一次读取可能只是发送模式配置，读数要等适配器的下一帧遥测。
pub async fn read_with_wait(
    handle: &SessionHandle,
    block: Block,
    wait: Duration,
) -> Result<Option<TelemetryValue>> {
    let deadline = Instant::now() + wait;
    loop {
        if let BlockResponse::Value(Some(value)) = handle.execute(block).await? {
            return Ok(Some(value));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(READ_RETRY_INTERVAL).await;
    }
}

/// 执行积木并打印结果
pub async fn run_block(handle: &SessionHandle, block: Block, wait: Duration) -> Result<()> {
    if block.is_reporter() {
        match read_with_wait(handle, block, wait).await? {
            Some(value) => println!("{}", value),
            None => println!("(暂无数据)"),
        }
        return Ok(());
    }

    match handle.execute(block).await? {
        BlockResponse::Settled(state) => println!("✅ {} ({:?})", block.opcode(), state),
        BlockResponse::Value(_) => {},
    }
    Ok(())
}

/// One-shot 模式
pub struct OneShotMode {
    config: BridgeConfig,
    quit: bool,
}

impl OneShotMode {
    pub fn new(config: BridgeConfig, quit: bool) -> Self {
        Self { config, quit }
    }

    /// 执行单个积木
    pub async fn execute(&self, block: Block, wait: Duration) -> Result<()> {
        let handle = connect(&self.config).await?;
        run_block(&handle, block, wait).await?;

        if self.quit {
            handle.shutdown().await?;
            println!("✅ 已发送 quit!");
        }
        Ok(())
    }

    /// 打印遥测帧直到 Ctrl+C
    pub async fn monitor(&self) -> Result<()> {
        let address = self.config.adapter.address();
        let (_sender, mut inbound) = TcpTransport::connect(address.as_str())
            .await
            .with_context(|| format!("无法连接到适配器 {}", address))?;

        let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
        ctrlc::set_handler(move || {
            let _ = stop_tx.send(());
        })
        .context("设置 Ctrl+C 处理器失败")?;

        println!("📡 监控 {}（Ctrl+C 退出）", address);
        let mut cache = TelemetryCache::new(self.config.topics.clone(), self.config.read_policy);

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                frame = inbound.recv() => match frame {
                    Some(frame) => {
                        let line = format!("{} {}", frame.topic, frame.payload);
                        match cache.ingest(frame) {
                            TopicKind::Init => println!("🔄 {}", line),
                            TopicKind::Sensor => println!("{}", line),
                            TopicKind::Unrecognized => println!("❔ {}", line),
                        }
                    },
                    None => {
                        warn!("Adapter closed the connection");
                        break;
                    },
                },
            }
        }

        info!("Monitor stopped after {} frame(s)", cache.frames_seen());
        Ok(())
    }
}
