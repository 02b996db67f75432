//! 写入稳定（settlement）
//!
//! 通道不提供确认，写入命令发出后等待固定延时即视为已生效：
//! `Sent` → `PresumedApplied`。这是时间上的节流，不是真正的应答。

use eim_protocol::CommandBatch;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// 稳定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    /// 命令已交给通道，延时未到
    Sent,
    /// 延时已过，推定适配器已执行
    PresumedApplied,
}

/// 一次写入操作的稳定句柄
///
/// 不借用分派器，等待期间遥测可以继续被处理。
#[derive(Debug, Clone)]
pub struct Settlement {
    sent_at: Instant,
    delay: Duration,
    commands: CommandBatch,
}

impl Settlement {
    /// 以当前时刻为发送时刻
    pub fn new(delay: Duration, commands: CommandBatch) -> Self {
        Self {
            sent_at: Instant::now(),
            delay,
            commands,
        }
    }

    pub fn state(&self) -> SettlementState {
        if Instant::now() >= self.deadline() {
            SettlementState::PresumedApplied
        } else {
            SettlementState::Sent
        }
    }

    pub fn deadline(&self) -> Instant {
        self.sent_at + self.delay
    }

    /// 距离推定生效的剩余时间
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 本次操作实际发出的命令（按发送顺序）
    pub fn commands(&self) -> &CommandBatch {
        &self.commands
    }
}

/// [`Settlement`] 的等待 future，到期后无条件完成
#[derive(Debug)]
pub struct Settled {
    sleep: Pin<Box<Sleep>>,
}

impl Future for Settled {
    type Output = SettlementState;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(SettlementState::PresumedApplied),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl IntoFuture for Settlement {
    type Output = SettlementState;
    type IntoFuture = Settled;

    fn into_future(self) -> Self::IntoFuture {
        Settled {
            sleep: Box::pin(tokio::time::sleep_until(self.deadline())),
        }
    }
}
