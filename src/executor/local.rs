//! 本地执行策略
//!
//! 包装一个活的查询句柄 ([`LocalQuery`]), 边界契约为
//! `slice(start, end) -> rows` 与 `all() -> rows`。句柄由外部
//! 协作方持有实现, 本引擎只做顺序复用。

use serde_json::Value;

use super::{FetchSpec, Fetched, QueryExecutor};
use crate::Result;

/// 本地查询句柄边界
pub trait LocalQuery {
    /// 切片 `[start, end)`, 越界部分截断
    fn slice(&mut self, start: usize, end: usize) -> Result<Vec<Vec<Value>>>;

    /// 全量结果
    fn all(&mut self) -> Result<Vec<Vec<Value>>>;

    /// 全量行数
    fn total(&self) -> usize;

    /// 查询的字面 SQL 形式
    fn literal_sql(&self) -> String;
}

/// 本地执行策略
pub struct LocalExecutor {
    query: Box<dyn LocalQuery>,
}

impl LocalExecutor {
    pub fn new(query: Box<dyn LocalQuery>) -> Self {
        Self { query }
    }
}

impl QueryExecutor for LocalExecutor {
    fn fetch_window(&mut self, _spec: &FetchSpec, start: usize, end: usize) -> Result<Fetched> {
        let rows = self.query.slice(start, end)?;
        Ok(Fetched {
            rows,
            total: Some(self.query.total()),
            runtime: None,
        })
    }

    fn fetch_all(&mut self, _spec: &FetchSpec) -> Result<Fetched> {
        let rows = self.query.all()?;
        Ok(Fetched {
            rows,
            total: Some(self.query.total()),
            runtime: None,
        })
    }

    fn refetch(&mut self, spec: &FetchSpec) -> Result<Fetched> {
        self.fetch_all(spec)
    }

    fn fetch_column(
        &mut self,
        _spec: &FetchSpec,
        _full_name: &str,
        position: usize,
    ) -> Result<Vec<Value>> {
        let rows = self.query.all()?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                if position < row.len() {
                    row.swap_remove(position)
                } else {
                    Value::Null
                }
            })
            .collect())
    }

    fn sorts_in_place(&self) -> bool {
        true
    }

    fn literal_query(&self) -> Option<String> {
        Some(self.query.literal_sql())
    }
}

/// 内存查询 - [`LocalQuery`] 的内存实现 (测试与嵌入场景)
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    rows: Vec<Vec<Value>>,
    sql: String,
}

impl MemoryQuery {
    pub fn new(rows: Vec<Vec<Value>>, sql: impl Into<String>) -> Self {
        Self {
            rows,
            sql: sql.into(),
        }
    }
}

impl LocalQuery for MemoryQuery {
    fn slice(&mut self, start: usize, end: usize) -> Result<Vec<Vec<Value>>> {
        let len = self.rows.len();
        let start = start.min(len);
        let end = end.min(len).max(start);
        Ok(self.rows[start..end].to_vec())
    }

    fn all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(self.rows.clone())
    }

    fn total(&self) -> usize {
        self.rows.len()
    }

    fn literal_sql(&self) -> String {
        self.sql.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> MemoryQuery {
        let rows = (0..5).map(|i| vec![json!(i)]).collect();
        MemoryQuery::new(rows, "SELECT i FROM t")
    }

    #[test]
    fn test_slice_clamps_out_of_range() {
        let mut q = query();
        assert_eq!(q.slice(3, 10).unwrap().len(), 2);
        assert_eq!(q.slice(7, 9).unwrap().len(), 0);
    }

    #[test]
    fn test_executor_reports_total_and_literal() {
        let mut exec = LocalExecutor::new(Box::new(query()));
        let spec = FetchSpec {
            op: "next",
            search_filter: String::new(),
            params_csv: String::new(),
            limit: None,
            sort: None,
        };
        let fetched = exec.fetch_window(&spec, 1, 3).unwrap();
        assert_eq!(fetched.rows.len(), 2);
        assert_eq!(fetched.total, Some(5));
        assert_eq!(exec.literal_query().as_deref(), Some("SELECT i FROM t"));
    }

    #[test]
    fn test_fetch_column_projects_position() {
        let rows = vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]];
        let mut exec = LocalExecutor::new(Box::new(MemoryQuery::new(rows, "")));
        let spec = FetchSpec {
            op: "get_list_of",
            search_filter: String::new(),
            params_csv: String::new(),
            limit: None,
            sort: None,
        };
        let col = exec.fetch_column(&spec, "t.n", 1).unwrap();
        assert_eq!(col, vec![json!(1), json!(2)]);
    }
}
