//! 引脚状态登记表
//!
//! 记录每个引脚最后一次下发的模式，纯内存数据结构，无 I/O。
//! 从未配置的引脚一律视为 [`PinMode::Unconfigured`]。

use eim_protocol::{Pin, PinMode};
use std::collections::HashMap;

/// 引脚 → 模式映射
///
/// 由 [`PinCommandDispatcher`](crate::PinCommandDispatcher) 独占持有，每个连接/会话一份。
#[derive(Debug, Clone, Default)]
pub struct PinStateRegistry {
    modes: HashMap<Pin, PinMode>,
}

impl PinStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询引脚模式，从未配置返回 `Unconfigured`
    pub fn get_mode(&self, pin: Pin) -> PinMode {
        self.modes.get(&pin).copied().unwrap_or_default()
    }

    /// 无条件覆盖引脚模式，返回之前的模式
    ///
    /// 不校验转换是否合法：真实板卡上任何模式都可以被重新配置。
    pub fn set_mode(&mut self, pin: Pin, mode: PinMode) -> PinMode {
        if mode == PinMode::Unconfigured {
            return self.modes.remove(&pin).unwrap_or_default();
        }
        self.modes.insert(pin, mode).unwrap_or_default()
    }

    /// 所有引脚回到 `Unconfigured`（适配器会话重新开始时调用）
    pub fn reset(&mut self) {
        self.modes.clear();
    }

    /// 已配置引脚数量
    pub fn configured_count(&self) -> usize {
        self.modes.len()
    }

    /// 已配置的引脚（按引脚排序）
    pub fn configured(&self) -> Vec<(Pin, PinMode)> {
        let mut pins: Vec<_> = self.modes.iter().map(|(p, m)| (*p, *m)).collect();
        pins.sort_by_key(|(pin, _)| *pin);
        pins
    }
}
