//! 遥测缓存
//!
//! 按主题保存最近一帧 payload（每帧整体替换，不保留历史），读取时按引脚键解析。
//!
//! # 读取策略
//!
//! - [`ReadPolicy::LastFrame`]：最近送达的帧必须来自传感器主题，否则读取为空。
//!   初始化帧或其他主题的帧到达后，直到下一帧传感器数据之前都不会返回旧值。
//! - [`ReadPolicy::LatestOnTopic`]：始终按传感器主题最近一帧解析。

use crate::config::{ReadPolicy, Topics};
use eim_protocol::{Pin, PinReport, TelemetryFrame, TelemetryValue};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{trace, warn};

/// 帧主题分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Sensor,
    Init,
    Unrecognized,
}

/// 遥测缓存
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    topics: Topics,
    policy: ReadPolicy,
    /// 最近送达帧的主题（包括未识别主题）
    last_topic: Option<String>,
    /// 每个主题最近一帧的对象 payload
    latest: HashMap<String, Map<String, Value>>,
    frames_seen: u64,
}

impl TelemetryCache {
    pub fn new(topics: Topics, policy: ReadPolicy) -> Self {
        Self {
            topics,
            policy,
            last_topic: None,
            latest: HashMap::new(),
            frames_seen: 0,
        }
    }

    pub fn classify(&self, topic: &str) -> TopicKind {
        if topic == self.topics.init {
            TopicKind::Init
        } else if topic == self.topics.sensor {
            TopicKind::Sensor
        } else {
            TopicKind::Unrecognized
        }
    }

    /// 按到达顺序应用一帧
    pub fn ingest(&mut self, frame: TelemetryFrame) -> TopicKind {
        let kind = self.classify(&frame.topic);
        self.frames_seen += 1;
        self.last_topic = Some(frame.topic.clone());

        match kind {
            TopicKind::Sensor => match frame.payload {
                Value::Object(map) => {
                    trace!("Sensor frame with {} keys", map.len());
                    self.latest.insert(frame.topic, map);
                },
                other => {
                    warn!("Sensor frame without object payload: {}", other);
                    self.latest.remove(&frame.topic);
                },
            },
            TopicKind::Init => self.latest.clear(),
            TopicKind::Unrecognized => {
                warn!("Ignoring frame on unrecognized topic {:?}", frame.topic);
            },
        }
        kind
    }

    /// 读取引脚的最新观测值，没有合适的帧时返回 `None`
    pub fn read(&self, pin: Pin) -> Option<TelemetryValue> {
        self.sensor_value(&pin.state_key())
    }

    /// 适配器回报的引脚状态（`pin_<n>_state`）
    pub fn pin_report(&self, index: u8) -> Option<PinReport> {
        self.sensor_payload()?
            .get(&PinReport::key(index))
            .and_then(PinReport::from_json)
    }

    /// 适配器上一条命令的求值结果（`output`）
    pub fn last_output(&self) -> Option<String> {
        match self.sensor_value("output")? {
            TelemetryValue::Text(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn last_topic(&self) -> Option<&str> {
        self.last_topic.as_deref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn policy(&self) -> ReadPolicy {
        self.policy
    }

    fn sensor_value(&self, key: &str) -> Option<TelemetryValue> {
        self.sensor_payload()?
            .get(key)
            .and_then(TelemetryValue::from_json)
    }

    fn sensor_payload(&self) -> Option<&Map<String, Value>> {
        let sensor = self.topics.sensor.as_str();
        if self.policy == ReadPolicy::LastFrame && self.last_topic.as_deref() != Some(sensor) {
            return None;
        }
        self.latest.get(sensor)
    }
}
