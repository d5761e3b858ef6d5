//! 结果控制器 - 引擎门面
//!
//! 持有查询指纹、列注册表、页缓冲与执行策略, 对外暴露翻页、排序、
//! 子集定位、子集合并、持久化与工具转换。每次成功导航都以同一收尾:
//! 刷新 total -> count, 经行工厂重建行, 若构造时指定了目标对象种类
//! 则对新缓冲重跑一次工具转换。
//!
//! 同步阻塞调用模型: 导航方法取 `&mut self`, 同一控制器同时至多一个
//! 在途调用由借用规则保证。致命错误中止本次调用并保持先前状态不变。

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::events::{EventSink, LogSink, ResultsWarning};
use crate::executor::{Executor, FetchSpec, Fetched, LocalQuery, RemoteTransport, RouteMap};
use crate::persist::{self, ResultsSnapshot, SNAPSHOT_VERSION};
use crate::query::columns::{ColumnRegistry, NameForm};
use crate::query::types::{Mode, QueryFingerprint, QueryRuntime, SortDirection, SortState};
use crate::results::convert::{self, DatasetObject, ToolKind};
use crate::results::row::{RowFactory, RowSchema};
use crate::results::set::ResultSet;
use crate::{Result, ResultsError};

/// `get_all` 拒绝的行数上限
pub const MAX_UNPAGINATED_ROWS: usize = 500_000;
/// `get_all` 拒绝的列数上限
pub const MAX_UNPAGINATED_COLUMNS: usize = 25;

/// 结果控制器
pub struct Results {
    fingerprint: Arc<QueryFingerprint>,
    registry: Arc<ColumnRegistry>,
    set: ResultSet,
    executor: Executor,
    mode: Mode,
    chunk: usize,
    start: usize,
    end: usize,
    total: usize,
    sort: Option<SortState>,
    return_kind: Option<ToolKind>,
    objects: Option<Vec<DatasetObject>>,
    runtime: Option<QueryRuntime>,
    query_sql: Option<String>,
    sink: Box<dyn EventSink>,
}

/// 控制器构造器
///
/// 以首批行 + 全量计数 + 指纹起步, 选定一种执行策略。
pub struct ResultsBuilder {
    fingerprint: QueryFingerprint,
    rows: Vec<Vec<Value>>,
    total: Option<usize>,
    chunk: usize,
    start: usize,
    executor: Executor,
    return_kind: Option<ToolKind>,
    sink: Option<Box<dyn EventSink>>,
    query_sql: Option<String>,
    runtime: Option<QueryRuntime>,
}

impl ResultsBuilder {
    pub fn new(fingerprint: QueryFingerprint, rows: Vec<Vec<Value>>) -> Self {
        Self {
            fingerprint,
            rows,
            total: None,
            chunk: 100,
            start: 0,
            executor: Executor::Detached,
            return_kind: None,
            sink: None,
            query_sql: None,
            runtime: None,
        }
    }

    /// 全量结果行数 (缺省取首批行数)
    pub fn total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// 分块大小 (指纹带 row_limit 时以 row_limit 为准)
    pub fn chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// 首批行的窗口起点
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// 本地执行策略
    pub fn local(mut self, query: Box<dyn LocalQuery>) -> Self {
        self.executor = Executor::Local(crate::executor::LocalExecutor::new(query));
        self
    }

    /// 远端执行策略
    pub fn remote(mut self, routes: Option<RouteMap>, transport: Box<dyn RemoteTransport>) -> Self {
        self.executor = Executor::Remote(crate::executor::RemoteExecutor::new(routes, transport));
        self
    }

    /// 每次缓冲刷新后自动转换的目标对象种类
    pub fn return_kind(mut self, kind: ToolKind) -> Self {
        self.return_kind = Some(kind);
        self
    }

    pub fn sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 查询的字面 SQL 形式
    pub fn query_sql(mut self, sql: impl Into<String>) -> Self {
        self.query_sql = Some(sql.into());
        self
    }

    pub fn runtime(mut self, runtime: QueryRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Results> {
        let fingerprint = Arc::new(self.fingerprint);
        let registry = Arc::new(ColumnRegistry::with_base(
            fingerprint.requested_params.clone(),
        ));
        let chunk = fingerprint.row_limit.unwrap_or(self.chunk);

        let schema = Arc::new(RowSchema::new(&registry, fingerprint.clone()));
        let rows = RowFactory::new(schema).build_all(self.rows)?;

        let count = rows.len();
        let total = self.total.unwrap_or(count);
        let start = self.start;
        let mode = self.executor.mode().unwrap_or(Mode::Local);
        let set = ResultSet::new(rows, start, total, chunk, registry.clone());

        let mut results = Results {
            fingerprint,
            registry,
            set,
            executor: self.executor,
            mode,
            chunk,
            start,
            end: start + chunk,
            total,
            sort: None,
            return_kind: self.return_kind,
            objects: None,
            runtime: self.runtime,
            query_sql: self.query_sql,
            sink: self.sink.unwrap_or_else(|| Box::new(LogSink)),
        };
        results.refresh_objects()?;
        Ok(results)
    }
}

impl Results {
    // ------------------------------------------------------------------
    // 状态访问
    // ------------------------------------------------------------------

    pub fn fingerprint(&self) -> &QueryFingerprint {
        &self.fingerprint
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// 当前页缓冲
    pub fn set(&self) -> &ResultSet {
        &self.set
    }

    /// 缓冲内行数
    pub fn count(&self) -> usize {
        self.set.count()
    }

    /// 全量结果行数
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// 当前窗口 `[start, end)`
    pub fn window(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    /// 最近一次转换出的领域对象
    pub fn objects(&self) -> Option<&[DatasetObject]> {
        self.objects.as_deref()
    }

    /// 最近一次远端查询耗时
    pub fn runtime(&self) -> Option<chrono::Duration> {
        self.runtime.map(|r| r.to_duration())
    }

    /// 恢复后策略是否缺失
    pub fn is_detached(&self) -> bool {
        self.executor.is_detached()
    }

    /// 查询的字面字符串形式
    pub fn show_query(&self) -> String {
        if let Some(sql) = self.executor.literal_query() {
            return sql;
        }
        if let Some(sql) = &self.query_sql {
            return sql.clone();
        }
        self.fingerprint.search_filter.clone()
    }

    // ------------------------------------------------------------------
    // 导航
    // ------------------------------------------------------------------

    /// 取下一块结果
    ///
    /// 负的 chunk 告警后回退到上一次分块; 越过末尾截断到 total 并告警;
    /// 缓冲已持有全部结果时为空操作。
    pub fn next(&mut self, chunk: Option<i64>) -> Result<&ResultSet> {
        let chunk = self.resolve_chunk(chunk);

        if self.total == self.set.count() {
            self.sink
                .warn(&ResultsWarning::AlreadyComplete { total: self.total });
            return Ok(&self.set);
        }

        let newstart = self.end;
        self.chunk = chunk;
        let mut newend = newstart + chunk;
        if newend > self.total {
            self.sink.warn(&ResultsWarning::AtEnd { end: self.total });
            newend = self.total;
        }

        self.refresh_window("next", newstart, newend)?;
        Ok(&self.set)
    }

    /// 取上一块结果, 起点截断到 0
    pub fn previous(&mut self, chunk: Option<i64>) -> Result<&ResultSet> {
        let chunk = self.resolve_chunk(chunk);

        if self.total == self.set.count() {
            self.sink
                .warn(&ResultsWarning::AlreadyComplete { total: self.total });
            return Ok(&self.set);
        }

        let newend = self.start;
        self.chunk = chunk;
        let newstart = if chunk > newend {
            self.sink.warn(&ResultsWarning::AtStart);
            0
        } else {
            newend - chunk
        };

        self.refresh_window("previous", newstart, newend)?;
        Ok(&self.set)
    }

    /// 绝对定位取子集
    ///
    /// 负的 start 截断到 0; 非正/缺省的 limit 回退到当前分块大小。
    /// 末端有意不按 total 截断: 请求越过末尾只会得到少于 limit 的行,
    /// 不是错误 (与翻页路径的末端截断不对称, 属既定行为)。
    pub fn subset(&mut self, start: i64, limit: Option<i64>) -> Result<&ResultSet> {
        let limit = match limit {
            Some(l) if l < 0 => {
                self.sink.warn(&ResultsWarning::InvalidChunk {
                    requested: l,
                    substituted: self.chunk,
                });
                self.chunk
            }
            Some(l) if l > 0 => l as usize,
            _ => self.chunk,
        };
        let start = if start < 0 { 0 } else { start as usize };

        self.chunk = limit;
        self.refresh_window("subset", start, start + limit)?;
        Ok(&self.set)
    }

    /// 取全量结果 (不分页)
    ///
    /// 行数或列数超限时拒绝并保持缓冲不变, 调用方应改用 `subset` 翻页。
    pub fn get_all(&mut self) -> Result<&ResultSet> {
        if self.total > MAX_UNPAGINATED_ROWS || self.registry.len() > MAX_UNPAGINATED_COLUMNS {
            return Err(ResultsError::ResultTooLarge {
                op: "get_all",
                rows: self.total,
                columns: self.registry.len(),
            });
        }

        let spec = self.fetch_spec("get_all");
        let fetched = self.executor.strategy("get_all")?.fetch_all(&spec)?;
        let end = fetched.rows.len();
        self.apply_fetch("get_all", fetched, 0, end)?;
        Ok(&self.set)
    }

    /// 按列排序
    ///
    /// 排序状态记录在控制器上; 本地策略对缓冲原地稳定排序, 远端策略
    /// 携带排序参数重新执行查询 (回到首页窗口)。
    pub fn sort(&mut self, column: &str, direction: SortDirection) -> Result<&ResultSet> {
        let remote = self.registry.resolve(column)?.remote.clone();
        self.sort = Some(SortState {
            column: remote.clone(),
            direction,
        });

        if self.executor.sorts_in_place() {
            self.set.sort_in_place(&remote, direction.is_descending())?;
        } else {
            let spec = self.fetch_spec("sort");
            let fetched = self.executor.strategy("sort")?.refetch(&spec)?;
            let end = fetched.rows.len();
            self.apply_fetch("sort", fetched, 0, end)?;
        }
        Ok(&self.set)
    }

    /// 合并多个子集为当前缓冲
    ///
    /// 每个子集都必须与当前注册表的列数与列名一致; 任何校验失败都
    /// 保持现有缓冲不变。合并按输入顺序拼接。
    pub fn merge_subsets(&mut self, subsets: &[ResultSet]) -> Result<&ResultSet> {
        let expected = self.registry.list(NameForm::Remote);

        for set in subsets {
            if set.registry().len() != self.registry.len() {
                return Err(ResultsError::RowCountMismatch {
                    op: "merge_subsets",
                    message: format!(
                        "subset has {} columns, base set has {}",
                        set.registry().len(),
                        self.registry.len()
                    ),
                });
            }
            if !set.registry().same_columns(&expected) {
                return Err(ResultsError::ColumnMismatch {
                    op: "merge_subsets",
                    message: "subset columns differ from the base set".to_string(),
                });
            }
        }

        let raw: Vec<Vec<Value>> = subsets
            .iter()
            .flat_map(|set| set.iter().map(|row| row.values().to_vec()))
            .collect();
        let rows = self.factory().build_all(raw)?;
        let merged = rows.len();

        self.start = 0;
        self.end = merged;
        self.set = ResultSet::new(rows, 0, self.total, self.chunk, self.registry.clone());
        self.refresh_objects()?;
        self.sink
            .info(&format!("merge_subsets: set results to {} rows", merged));
        Ok(&self.set)
    }

    /// 提取单列值
    ///
    /// `return_all` 为真时取该列的全量投影 (远端走单列端点, 本地全量
    /// 切片后投影), 否则只投影当前缓冲。
    pub fn get_list_of(&mut self, name: &str, return_all: bool) -> Result<Vec<Value>> {
        let descriptor = self.registry.resolve(name)?.clone();

        if !return_all {
            return Ok(self.set.column(&descriptor.remote)?.into_vec());
        }

        let position = self
            .factory()
            .schema()
            .position(&descriptor.remote)
            .ok_or_else(|| ResultsError::UnknownColumn {
                name: descriptor.remote.clone(),
            })?;
        let spec = self.fetch_spec("get_list_of");
        self.executor
            .strategy("get_list_of")?
            .fetch_column(&spec, &descriptor.full, position)
    }

    /// 把当前缓冲转换为领域对象
    ///
    /// `kind` 必须属于封闭的对象种类集合; 此后每次缓冲刷新都会自动
    /// 重跑转换。
    pub fn convert_to_tool(
        &mut self,
        kind: &str,
        limit: Option<usize>,
        mode: Option<Mode>,
    ) -> Result<&[DatasetObject]> {
        let kind = ToolKind::parse(kind)?;
        let mode = mode.unwrap_or(self.mode);
        let objects = convert::convert(&self.set, &self.registry, kind, mode, limit)?;
        self.return_kind = Some(kind);
        self.objects = Some(objects);
        Ok(self.objects.as_deref().unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // 持久化
    // ------------------------------------------------------------------

    /// 保存会话到单文件归档
    ///
    /// 省略路径时由指纹推导默认文件名。已存在的文件未授权覆盖时只
    /// 告警并返回 `None`。写入前丢弃活的本地查询句柄, 并把查询归一化
    /// 为字面 SQL 字符串。
    pub fn save(&mut self, path: Option<&Path>, overwrite: bool) -> Result<Option<PathBuf>> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => persist::default_archive_path(&self.fingerprint),
        };
        let path = persist::ensure_extension(path);

        if path.is_dir() {
            return Err(ResultsError::Persistence {
                op: "save",
                message: format!("'{}' is a directory, expected a file path", path.display()),
            });
        }
        if path.exists() && !overwrite {
            self.sink.warn(&ResultsWarning::OverwriteRefused {
                path: path.display().to_string(),
            });
            return Ok(None);
        }

        // 查询归一化 + 丢弃本地句柄
        if let Some(sql) = self.executor.literal_query() {
            self.query_sql = Some(sql);
        }
        if matches!(self.executor, Executor::Local(_)) {
            self.executor = Executor::Detached;
        }

        let snapshot = self.snapshot();
        persist::write_snapshot(&path, &snapshot)?;
        Ok(Some(path))
    }

    /// 从归档恢复会话
    ///
    /// 恢复出的控制器不持有任何活的查询句柄 (策略为 Detached), 需要
    /// 重新挂接策略才能继续导航。`delete` 为真时成功读取后删除归档。
    pub fn restore(path: &Path, delete: bool) -> Result<Results> {
        let snapshot = persist::read_snapshot(path, delete)?;
        Results::from_snapshot(snapshot)
    }

    /// 恢复后重新挂接本地策略
    pub fn attach_local(&mut self, query: Box<dyn LocalQuery>) {
        self.executor = Executor::Local(crate::executor::LocalExecutor::new(query));
        self.mode = Mode::Local;
    }

    /// 恢复后重新挂接远端策略
    pub fn attach_remote(&mut self, routes: Option<RouteMap>, transport: Box<dyn RemoteTransport>) {
        self.executor = Executor::Remote(crate::executor::RemoteExecutor::new(routes, transport));
        self.mode = Mode::Remote;
    }

    fn snapshot(&self) -> ResultsSnapshot {
        ResultsSnapshot {
            version: SNAPSHOT_VERSION,
            fingerprint: (*self.fingerprint).clone(),
            columns: self.registry.descriptors().to_vec(),
            rows: self
                .set
                .iter()
                .map(|row| row.values().to_vec())
                .collect(),
            start: self.start,
            end: self.end,
            chunk: self.chunk,
            total: self.total,
            mode: self.mode,
            sort: self.sort.clone(),
            return_kind: self.return_kind,
            query_sql: self.query_sql.clone(),
        }
    }

    fn from_snapshot(snapshot: ResultsSnapshot) -> Result<Results> {
        let fingerprint = Arc::new(snapshot.fingerprint);
        let registry = Arc::new(ColumnRegistry::from_descriptors(snapshot.columns));
        let schema = Arc::new(RowSchema::new(&registry, fingerprint.clone()));
        let rows = RowFactory::new(schema).build_all(snapshot.rows)?;
        let set = ResultSet::new(
            rows,
            snapshot.start,
            snapshot.total,
            snapshot.chunk,
            registry.clone(),
        );

        let mut results = Results {
            fingerprint,
            registry,
            set,
            executor: Executor::Detached,
            mode: snapshot.mode,
            chunk: snapshot.chunk,
            start: snapshot.start,
            end: snapshot.end,
            total: snapshot.total,
            sort: snapshot.sort,
            return_kind: snapshot.return_kind,
            objects: None,
            runtime: None,
            query_sql: snapshot.query_sql,
            sink: Box::new(LogSink),
        };
        results.refresh_objects()?;
        Ok(results)
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    fn resolve_chunk(&mut self, requested: Option<i64>) -> usize {
        match requested {
            None => self.chunk,
            Some(c) if c < 0 => {
                self.sink.warn(&ResultsWarning::InvalidChunk {
                    requested: c,
                    substituted: self.chunk,
                });
                self.chunk
            }
            Some(c) => c as usize,
        }
    }

    fn fetch_spec(&self, op: &'static str) -> FetchSpec {
        FetchSpec {
            op,
            search_filter: self.fingerprint.search_filter.clone(),
            params_csv: self.fingerprint.params_csv(),
            limit: self.fingerprint.row_limit,
            sort: self.sort.clone(),
        }
    }

    fn factory(&self) -> RowFactory {
        let schema = Arc::new(RowSchema::new(&self.registry, self.fingerprint.clone()));
        RowFactory::new(schema)
    }

    fn refresh_window(&mut self, op: &'static str, start: usize, end: usize) -> Result<()> {
        let spec = self.fetch_spec(op);
        let fetched = self.executor.strategy(op)?.fetch_window(&spec, start, end)?;
        self.apply_fetch(op, fetched, start, end)
    }

    /// 导航收尾: 刷新计数、重建行、必要时重跑工具转换
    ///
    /// 任何一步失败都在修改状态之前返回, 缓冲保持调用前内容。
    fn apply_fetch(&mut self, op: &'static str, fetched: Fetched, start: usize, end: usize) -> Result<()> {
        let rows = self.factory().build_all(fetched.rows)?;
        let total = fetched.total.unwrap_or(self.total);
        let set = ResultSet::new(rows, start, total, self.chunk, self.registry.clone());
        let objects = match self.return_kind {
            Some(kind) => Some(convert::convert(&set, &self.registry, kind, self.mode, None)?),
            None => None,
        };

        self.total = total;
        if fetched.runtime.is_some() {
            self.runtime = fetched.runtime;
        }
        self.start = start;
        self.end = end;
        self.set = set;
        if objects.is_some() {
            self.objects = objects;
        }

        self.sink.info(&format!(
            "{}: retrieved rows {}..{} of {}",
            op, start, end, self.total
        ));
        Ok(())
    }

    fn refresh_objects(&mut self) -> Result<()> {
        if let Some(kind) = self.return_kind {
            self.objects = Some(convert::convert(
                &self.set,
                &self.registry,
                kind,
                self.mode,
                None,
            )?);
        }
        Ok(())
    }
}

impl fmt::Display for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results(filter={}, total={}, count={}, mode={})",
            self.fingerprint.search_filter,
            self.total,
            self.set.count(),
            self.mode.as_str()
        )
    }
}
