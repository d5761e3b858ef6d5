// 执行策略层 - 模式分发
//
// ┌──────────────────────────────────────────────────────┐
// │                  Results Controller                  │
// │                        │                             │
// │                 ┌──────▼──────┐                      │
// │                 │  Executor   │  (构造时选定一次)      │
// │                 └──────┬──────┘                      │
// │            ┌───────────┴───────────┐                 │
// │     ┌──────▼──────┐         ┌──────▼──────┐          │
// │     │LocalExecutor│         │RemoteExecutor│         │
// │     │ (查询句柄)   │         │ (HTTP 传输)  │          │
// │     └─────────────┘         └─────────────┘          │
// └──────────────────────────────────────────────────────┘
//
// 两种策略实现同一导航契约, 控制器不在调用点做模式判断。

pub mod local;
pub mod remote;

pub use local::{LocalExecutor, LocalQuery, MemoryQuery};
pub use remote::{RemoteExecutor, RemoteRequest, RemoteResponse, RemoteTransport, RouteMap};

use serde_json::Value;

use crate::query::types::{Mode, QueryRuntime, SortState};
use crate::{Result, ResultsError};

/// 一次抓取的请求规格, 由控制器从指纹 + 排序状态拼装
#[derive(Debug, Clone)]
pub struct FetchSpec {
    /// 触发抓取的操作名 (错误信息携带)
    pub op: &'static str,
    pub search_filter: String,
    /// 请求参数的 CSV 形式
    pub params_csv: String,
    pub limit: Option<usize>,
    /// 当前排序状态, 远端每次请求都重新携带
    pub sort: Option<SortState>,
}

/// 抓取结果
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    /// 原始值行
    pub rows: Vec<Vec<Value>>,
    /// 刷新后的全量行数 (本地为句柄统计, 远端为响应 total_count)
    pub total: Option<usize>,
    /// 服务端查询耗时
    pub runtime: Option<QueryRuntime>,
}

/// 导航契约 - 本地/远端策略的共同接口
pub trait QueryExecutor {
    /// 抓取窗口 `[start, end)`
    fn fetch_window(&mut self, spec: &FetchSpec, start: usize, end: usize) -> Result<Fetched>;

    /// 抓取全量结果
    fn fetch_all(&mut self, spec: &FetchSpec) -> Result<Fetched>;

    /// 按当前规格重新执行查询 (远端排序路径)
    fn refetch(&mut self, spec: &FetchSpec) -> Result<Fetched>;

    /// 抓取单列的全量投影
    ///
    /// `position` 为该列在行中的下标, 本地投影使用; 远端按列名路由。
    fn fetch_column(
        &mut self,
        spec: &FetchSpec,
        full_name: &str,
        position: usize,
    ) -> Result<Vec<Value>>;

    /// 排序是否原地作用于缓冲 (本地 true, 远端 false)
    fn sorts_in_place(&self) -> bool;

    /// 查询的字面 SQL 形式 (仅本地句柄可提供)
    fn literal_query(&self) -> Option<String>;
}

/// 模式分发器
///
/// 构造时选定一个策略变体; 归档恢复后为 [`Executor::Detached`],
/// 任何导航都会失败, 直到重新挂接策略。
pub enum Executor {
    Local(LocalExecutor),
    Remote(RemoteExecutor),
    Detached,
}

impl Executor {
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Executor::Local(_) => Some(Mode::Local),
            Executor::Remote(_) => Some(Mode::Remote),
            Executor::Detached => None,
        }
    }

    /// 取当前策略, 未挂接时返回 `Detached` 错误
    pub fn strategy(&mut self, op: &'static str) -> Result<&mut dyn QueryExecutor> {
        match self {
            Executor::Local(e) => Ok(e as &mut dyn QueryExecutor),
            Executor::Remote(e) => Ok(e as &mut dyn QueryExecutor),
            Executor::Detached => Err(ResultsError::Detached { op }),
        }
    }

    /// 排序是否原地生效; 未挂接策略时只剩缓冲, 同样原地排序
    pub fn sorts_in_place(&self) -> bool {
        !matches!(self, Executor::Remote(_))
    }

    pub fn literal_query(&self) -> Option<String> {
        match self {
            Executor::Local(e) => e.literal_query(),
            _ => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Executor::Detached)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executor::Local(_) => write!(f, "Executor::Local"),
            Executor::Remote(_) => write!(f, "Executor::Remote"),
            Executor::Detached => write!(f, "Executor::Detached"),
        }
    }
}
