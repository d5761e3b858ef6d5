//! 事件接收器 - 注入式告警/信息通知
//!
//! 分页边界、截断替换等可恢复状况不中断调用, 而是以 [`ResultsWarning`]
//! 值的形式投递给构造时注入的 [`EventSink`]。默认实现 [`LogSink`]
//! 转发到 `log` 宏; 测试使用 [`RecordingSink`] 捕获事件。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// 可恢复告警
///
/// 每个变体携带到达的边界与实际替换值 (操作继续执行, 不会失败)。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsWarning {
    /// 请求的分块大小为负, 回退到上一次的分块大小
    InvalidChunk { requested: i64, substituted: usize },

    /// 已到达结果集起始位置
    AtStart,

    /// 已到达结果集末尾, 窗口截断到 end
    AtEnd { end: usize },

    /// 缓冲区已持有全部结果, 翻页是空操作
    AlreadyComplete { total: usize },

    /// 目标归档文件已存在且未允许覆盖, 未写入
    OverwriteRefused { path: String },
}

impl fmt::Display for ResultsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultsWarning::InvalidChunk {
                requested,
                substituted,
            } => write!(
                f,
                "chunk cannot be negative ({}), falling back to {}",
                requested, substituted
            ),
            ResultsWarning::AtStart => write!(f, "reached the beginning of the result set"),
            ResultsWarning::AtEnd { end } => {
                write!(f, "reached the end of the result set, window clamped to {}", end)
            }
            ResultsWarning::AlreadyComplete { total } => {
                write!(f, "already holding all {} results, nothing to page", total)
            }
            ResultsWarning::OverwriteRefused { path } => {
                write!(f, "file '{}' already exists, not overwriting", path)
            }
        }
    }
}

/// 事件接收器接口
///
/// 控制器构造时注入, 不依赖任何进程级单例。
pub trait EventSink {
    /// 常规进度信息 (翻页范围等)
    fn info(&self, message: &str);

    /// 可恢复告警
    fn warn(&self, warning: &ResultsWarning);
}

/// 默认接收器 - 转发到 `log` 宏
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn info(&self, message: &str) {
        log::info!("{}", message);
    }

    fn warn(&self, warning: &ResultsWarning) {
        log::warn!("{}", warning);
    }
}

/// 记录式接收器 - 捕获全部事件供事后检查
///
/// 克隆共享同一份记录, 方便把一个句柄交给控制器、另一个留在测试中断言。
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    inner: Rc<RefCell<RecordedEvents>>,
}

#[derive(Debug, Default)]
struct RecordedEvents {
    messages: Vec<String>,
    warnings: Vec<ResultsWarning>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已捕获的信息条目
    pub fn messages(&self) -> Vec<String> {
        self.inner.borrow().messages.clone()
    }

    /// 已捕获的告警
    pub fn warnings(&self) -> Vec<ResultsWarning> {
        self.inner.borrow().warnings.clone()
    }

    pub fn warning_count(&self) -> usize {
        self.inner.borrow().warnings.len()
    }
}

impl EventSink for RecordingSink {
    fn info(&self, message: &str) {
        self.inner.borrow_mut().messages.push(message.to_string());
    }

    fn warn(&self, warning: &ResultsWarning) {
        self.inner.borrow_mut().warnings.push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_states_substitution() {
        let w = ResultsWarning::InvalidChunk {
            requested: -5,
            substituted: 10,
        };
        let text = w.to_string();
        assert!(text.contains("-5"));
        assert!(text.contains("10"));
    }

    #[test]
    fn test_recording_sink_shares_log_across_clones() {
        let sink = RecordingSink::new();
        let handle = sink.clone();
        handle.warn(&ResultsWarning::AtStart);
        handle.info("page 1");
        assert_eq!(sink.warning_count(), 1);
        assert_eq!(sink.messages(), vec!["page 1".to_string()]);
    }
}
