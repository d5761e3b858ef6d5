//! # STARQUERY-RS
//!
//! 巡天数据集查询结果引擎 - 本地/远端双执行策略
//!
//! ## 核心能力
//!
//! - **查询指纹**: 过滤表达式 + 请求参数 + 发布版本 + 行数上限的查询身份
//! - **列注册表**: 逻辑参数名的四种形式 (full/remote/display/short) 解析
//! - **行模式**: 运行期按查询确定字段集的不可变命名记录 + 显式合并
//! - **页缓冲**: 大结果集上的连续窗口视图, 前进/后退/任意定位翻页
//! - **模式分发**: 本地查询句柄与远端 HTTP 式服务共用同一导航契约
//! - **工具转换**: 结果行到领域对象描述符的惰性批量转换
//! - **会话持久化**: 版本化 JSON 快照, 保存/恢复可移植归档
//!
//! ## 架构设计
//!
//! ```text
//! 调用方
//!     ↓
//! Results Controller (results/controller)
//!     ↓
//! Mode Dispatcher (executor/)
//!     ├── LocalExecutor  ← 活的查询句柄 (外部协作方)
//!     └── RemoteExecutor ← HTTP 式传输 (外部协作方)
//!     ↓
//! ResultSet + RowFactory (results/)
//!     ↓
//! ColumnRegistry (query/)
//! ```
//!
//! ## 调用模型
//!
//! 同步阻塞, 单线程: 导航方法取 `&mut self`, 每次调用等待完整响应后
//! 返回, 不做后台预取, 传输失败不自动重试且缓冲保持调用前状态。

// ============================================================================
// 外部依赖
// ============================================================================

// 序列化
pub use serde;
pub use serde_json;

// 时间
pub use chrono;

// 日志
pub use log;

// 错误处理
pub use thiserror;

// ============================================================================
// 内部模块
// ============================================================================

/// 查询层 - 指纹与列注册表
pub mod query;

/// 结果引擎 - 行/缓冲/控制器/转换
pub mod results;

/// 执行策略层 - 本地/远端模式分发
pub mod executor;

/// 会话持久化
pub mod persist;

/// 事件接收器
pub mod events;

// ============================================================================
// 重导出常用类型
// ============================================================================

pub use events::{EventSink, LogSink, RecordingSink, ResultsWarning};
pub use executor::{
    Executor, FetchSpec, Fetched, LocalQuery, MemoryQuery, QueryExecutor, RemoteRequest,
    RemoteResponse, RemoteTransport, RouteMap,
};
pub use persist::{ResultsSnapshot, SNAPSHOT_VERSION};
pub use query::{
    ColumnDescriptor, ColumnRegistry, Mode, NameForm, QueryFingerprint, QueryRuntime,
    SortDirection, SortState,
};
pub use results::{
    merge, DatasetObject, Projection, Results, ResultsBuilder, ResultSet, Row, RowFactory,
    RowSchema, Table, TableShape, ToolKind,
};

// ============================================================================
// 全局错误类型
// ============================================================================

/// 结果引擎错误类型
///
/// 致命错误携带触发操作名与底层原因; 可恢复状况不走错误通道,
/// 见 [`events::ResultsWarning`]。
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("Unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("Schema mismatch in {op}: expected {expected} values, got {got}")]
    SchemaMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Fingerprint mismatch in {op}: cannot combine rows from different queries")]
    FingerprintMismatch { op: &'static str },

    #[error("Identity mismatch in {op}: {left} != {right}")]
    IdentityMismatch {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("Result too large in {op}: {rows} rows x {columns} columns, use subset() to page through")]
    ResultTooLarge {
        op: &'static str,
        rows: usize,
        columns: usize,
    },

    #[error("Column mismatch in {op}: {message}")]
    ColumnMismatch {
        op: &'static str,
        message: String,
    },

    #[error("Row count mismatch in {op}: {message}")]
    RowCountMismatch {
        op: &'static str,
        message: String,
    },

    #[error("Invalid tool kind '{kind}', must be one of: {allowed}")]
    InvalidToolKind { kind: String, allowed: String },

    #[error("No route map configured, cannot make remote call for {op}")]
    NoRouteMap { op: &'static str },

    #[error("Remote call {op} failed: {message}")]
    Remote {
        op: &'static str,
        message: String,
    },

    #[error("Persistence error in {op}: {message}")]
    Persistence {
        op: &'static str,
        message: String,
    },

    #[error("No executor attached for {op}: restored sessions must re-attach a strategy")]
    Detached { op: &'static str },
}

pub type Result<T> = std::result::Result<T, ResultsError>;
