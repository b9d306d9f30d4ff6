//! 缓冲构造配置。
//!
//! # 教案式说明
//! - **意图（Why）**：配置的来源（文件、环境、控制面）属于外部协作者，缓冲核心只关心三个值：
//!   容量上限、告警水位与会话关联 ID。这里提供带默认值的 serde 结构与 TOML 入口，
//!   让宿主可以直接把一段配置文本交给缓冲。
//! - **契约（What）**：任何进入 [`BurstBuffer`](crate::BurstBuffer) 的配置都必须先通过 [`BufferConfig::validate`]；
//!   `from_toml_str` 在解析后自动校验。

use serde::Deserialize;

use crate::{error::ConfigError, governor::Thresholds};

/// 默认缓冲上限：64 MiB。
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// 默认告警水位（百分比）。
pub const DEFAULT_WARNING_THRESHOLD: f64 = 80.0;

/// 未指定关联 ID 时使用的占位值。
pub const DEFAULT_CORRELATION_ID: &str = "default";

/// 缓冲构造配置。
///
/// ```toml
/// max_buffer_size = 8388608
/// warning_threshold = 75.0
/// correlation_id = "rec-2026-10-17"
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// 缓冲允许持有的最大字节数，必须大于 0。
    pub max_buffer_size: usize,
    /// 告警水位，单位为百分比，取值 `[0, 100]`。
    pub warning_threshold: f64,
    /// 写入每一行日志的会话关联 ID。
    pub correlation_id: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            correlation_id: DEFAULT_CORRELATION_ID.to_owned(),
        }
    }
}

impl BufferConfig {
    /// 以显式参数构造配置；不做校验，校验在构建缓冲时统一执行。
    pub fn new(
        max_buffer_size: usize,
        warning_threshold: f64,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            max_buffer_size,
            warning_threshold,
            correlation_id: correlation_id.into(),
        }
    }

    /// 解析 TOML 文本并校验；缺失的字段取默认值，未知字段视为错误。
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: BufferConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验容量与水位。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffer_size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !self.warning_threshold.is_finite() || !(0.0..=100.0).contains(&self.warning_threshold)
        {
            return Err(ConfigError::ThresholdOutOfRange {
                value: self.warning_threshold,
            });
        }
        Ok(())
    }

    /// 提取治理器使用的阈值视图。
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.max_buffer_size, self.warning_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = BufferConfig::from_toml_str("correlation_id = \"rec-1\"").expect("合法配置");
        assert_eq!(config.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
        assert_eq!(config.warning_threshold, DEFAULT_WARNING_THRESHOLD);
        assert_eq!(config.correlation_id, "rec-1");
    }

    #[test]
    fn full_document_parses() {
        let config = BufferConfig::from_toml_str(
            "max_buffer_size = 2000\nwarning_threshold = 50.0\ncorrelation_id = \"cam-3\"\n",
        )
        .expect("合法配置");
        assert_eq!(config, BufferConfig::new(2000, 50.0, "cam-3"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BufferConfig::new(0, 80.0, "x").validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity);
    }

    #[test]
    fn threshold_outside_percentage_range_is_rejected() {
        for value in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
            let err = BufferConfig::new(1024, value, "x").validate().unwrap_err();
            assert!(matches!(err, ConfigError::ThresholdOutOfRange { .. }));
        }
        assert!(BufferConfig::new(1024, 0.0, "x").validate().is_ok());
        assert!(BufferConfig::new(1024, 100.0, "x").validate().is_ok());
    }

    #[test]
    fn unknown_fields_and_bad_values_fail_to_parse() {
        assert!(matches!(
            BufferConfig::from_toml_str("max_bufer_size = 10"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            BufferConfig::from_toml_str("max_buffer_size = 0"),
            Err(ConfigError::ZeroCapacity)
        ));
    }
}
