//! 桥接配置
//!
//! TOML 格式，所有字段都有默认值，缺失的段落按默认处理：
//!
//! ```toml
//! settlement_delay_ms = 100
//! read_policy = "last-frame"
//!
//! [adapter]
//! host = "127.0.0.1"
//! port = 12358
//!
//! [topics]
//! command = "eim/arduino"
//! sensor = "eim/arduino"
//! init = "eim/arduino/init"
//!
//! [board]
//! digital_pins = [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]
//! analog_pins = [0, 1, 2, 3, 4, 5, 6, 7]
//! pwm_pins = [3, 5, 6, 9, 10, 11]
//! ```

use crate::error::DriverError;
use eim_protocol::{BoardLayout, COMMAND_TOPIC, INIT_TOPIC, SENSOR_TOPIC};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 默认写入稳定延时（毫秒）
pub const DEFAULT_SETTLEMENT_DELAY_MS: u64 = 100;

/// 读取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPolicy {
    /// 只有最近一帧来自传感器主题时才返回读数
    #[default]
    LastFrame,
    /// 返回传感器主题最近一帧中的读数，不受其他主题帧的影响
    LatestOnTopic,
}

/// 适配器地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12358,
        }
    }
}

impl AdapterConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 主题配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    /// 命令下发主题
    pub command: String,
    /// 传感器遥测主题
    pub sensor: String,
    /// 会话开始信号主题
    pub init: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            command: COMMAND_TOPIC.to_string(),
            sensor: SENSOR_TOPIC.to_string(),
            init: INIT_TOPIC.to_string(),
        }
    }
}

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 写入命令后的固定稳定延时（毫秒）
    pub settlement_delay_ms: u64,
    pub read_policy: ReadPolicy,
    pub adapter: AdapterConfig,
    pub topics: Topics,
    pub board: BoardLayout,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            settlement_delay_ms: DEFAULT_SETTLEMENT_DELAY_MS,
            read_policy: ReadPolicy::default(),
            adapter: AdapterConfig::default(),
            topics: Topics::default(),
            board: BoardLayout::default(),
        }
    }
}

impl BridgeConfig {
    pub fn settlement_delay(&self) -> Duration {
        Duration::from_millis(self.settlement_delay_ms)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), DriverError> {
        if self.topics.init == self.topics.sensor {
            return Err(DriverError::Config(format!(
                "init topic must differ from sensor topic ({:?})",
                self.topics.sensor
            )));
        }
        if let Some(pin) = self
            .board
            .pwm_pins
            .iter()
            .find(|p| !self.board.digital_pins.contains(*p))
        {
            return Err(DriverError::Config(format!(
                "PWM pin {} is not a digital pin",
                pin
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.settlement_delay(), Duration::from_millis(100));
        assert_eq!(config.read_policy, ReadPolicy::LastFrame);
        assert_eq!(config.topics.command, "eim/arduino");
        assert_eq!(config.topics.init, "eim/arduino/init");
        assert_eq!(config.adapter.address(), "127.0.0.1:12358");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
settlement_delay_ms = 250
read_policy = "latest-on-topic"

[adapter]
port = 9000
"#,
        )
        .unwrap();

        assert_eq!(config.settlement_delay_ms, 250);
        assert_eq!(config.read_policy, ReadPolicy::LatestOnTopic);
        assert_eq!(config.adapter.host, "127.0.0.1");
        assert_eq!(config.adapter.port, 9000);
        assert_eq!(config.topics, Topics::default());
        assert_eq!(config.board, BoardLayout::default());
    }

    #[test]
    fn test_rejects_invalid() {
        let err = BridgeConfig::from_toml_str(
            r#"
[topics]
sensor = "x"
init = "x"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));

        let err = BridgeConfig::from_toml_str("[board]\ndigital_pins = [2]\npwm_pins = [3]\n")
            .unwrap_err();
        assert!(err.to_string().contains("PWM pin 3"));

        assert!(BridgeConfig::from_toml_str("read_policy = \"whatever\"").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let mut config = BridgeConfig::default();
        config.settlement_delay_ms = 40;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = BridgeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = BridgeConfig::load_from_file("/nonexistent/eim-bridge.toml").unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }
}
