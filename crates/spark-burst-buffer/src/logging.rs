//! 日志能力契约与默认的 `tracing` 实现。
//!
//! # 教案式说明
//! - **意图（Why）**：缓冲核心只需要 `warn`/`error` 两种输出能力，但必须让每一行日志都带上会话关联 ID，
//!   以便在长时间录制中交叉比对；日志后端（文件、syslog、OpenTelemetry）属于外部协作者。
//! - **逻辑（How）**：[`Logger::log`] 是唯一必需方法，`warn`/`error` 便捷方法构造 [`LogRecord`] 后统一走 `log`，
//!   确保所有路径共享同一格式；[`TracingLogger`] 把记录映射为带结构化字段的 `tracing` 事件。
//! - **契约（What）**：实现应尽量非阻塞，调用发生在录制热路径上。

use core::fmt;
use std::borrow::Cow;

/// 日志级别；缓冲核心只会产生这两种级别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Warn,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSeverity::Warn => f.write_str("WARN"),
            LogSeverity::Error => f.write_str("ERROR"),
        }
    }
}

/// 单条日志记录。
///
/// - `message`：人类可读正文，字节量已格式化为 `KB`/`MB` 等单位；
/// - `correlation_id`：构造缓冲时注入的会话标识；
/// - `Display` 输出 `[correlation_id] message`，供只接受纯文本的后端直接使用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord<'a> {
    pub severity: LogSeverity,
    pub correlation_id: &'a str,
    pub message: Cow<'a, str>,
}

impl<'a> LogRecord<'a> {
    /// 构建新的日志记录。
    pub fn new(
        severity: LogSeverity,
        correlation_id: &'a str,
        message: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            severity,
            correlation_id,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.correlation_id, self.message)
    }
}

/// 缓冲核心消费的日志能力。
pub trait Logger: Send + Sync + 'static {
    /// 提交一条日志记录。
    fn log(&self, record: &LogRecord<'_>);

    /// 输出 WARN 日志。
    fn warn(&self, correlation_id: &str, message: &str) {
        self.log(&LogRecord::new(LogSeverity::Warn, correlation_id, message));
    }

    /// 输出 ERROR 日志。
    fn error(&self, correlation_id: &str, message: &str) {
        self.log(&LogRecord::new(LogSeverity::Error, correlation_id, message));
    }
}

/// 默认日志实现：转发到 `tracing`，`correlation_id` 作为结构化字段输出。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        match record.severity {
            LogSeverity::Warn => tracing::warn!(
                correlation_id = %record.correlation_id,
                "{}",
                record
            ),
            LogSeverity::Error => tracing::error!(
                correlation_id = %record.correlation_id,
                "{}",
                record
            ),
        }
    }
}

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// 将字节数格式化为人类可读的字符串（1024 进制，非整字节单位保留两位小数）。
///
/// ```
/// use spark_burst_buffer::logging::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(64 * 1024 * 1024), "64.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn record_display_prefixes_correlation_id() {
        let record = LogRecord::new(LogSeverity::Warn, "session-7", "usage high");
        assert_eq!(record.to_string(), "[session-7] usage high");
    }

    #[test]
    #[traced_test]
    fn tracing_logger_emits_correlation_field() {
        let logger = TracingLogger;
        logger.warn("rec-42", "buffer usage high: 85.0%");
        logger.error("rec-42", "buffer overflow");
        assert!(logs_contain("correlation_id=rec-42"));
        assert!(logs_contain("[rec-42] buffer usage high: 85.0%"));
        assert!(logs_contain("[rec-42] buffer overflow"));
    }
}
