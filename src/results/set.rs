//! 结果页缓冲 (ResultSet)
//!
//! 全量结果集上一段连续窗口 `[index, index + chunk)` 的有序行视图,
//! 关联列注册表。每次成功导航都整体替换缓冲, 不做原地增删。

use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde_json::Value;

use crate::query::columns::{ColumnRegistry, NameForm};
use crate::results::row::{self, Row, RowFactory};
use crate::{Result, ResultsError};

/// 表格形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// 每行一个映射
    RowMajor,
    /// 每列一个序列
    ColumnMajor,
}

/// `to_table` 的输出
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Rows(Vec<serde_json::Map<String, Value>>),
    Columns(Vec<(String, Vec<Value>)>),
}

/// 单列投影
///
/// 恰好一个元素的投影按契约折叠为标量; 两种形态语义等价,
/// 调用方不应依赖元素个数之外的类型差异。
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Scalar(Value),
    List(Vec<Value>),
}

impl Projection {
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Projection::Scalar(v) => vec![v],
            Projection::List(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Projection::Scalar(_) => 1,
            Projection::List(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 分页结果缓冲
#[derive(Debug, Clone)]
pub struct ResultSet {
    rows: Vec<Row>,
    /// 窗口首行在全量结果集中的下标
    index: usize,
    total: usize,
    chunk: usize,
    registry: Arc<ColumnRegistry>,
}

impl ResultSet {
    pub fn new(
        rows: Vec<Row>,
        index: usize,
        total: usize,
        chunk: usize,
        registry: Arc<ColumnRegistry>,
    ) -> Self {
        Self {
            rows,
            index,
            total,
            chunk,
            registry,
        }
    }

    /// 缓冲中的行数
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// 全量结果行数
    pub fn total(&self) -> usize {
        self.total
    }

    /// 窗口起点
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// 总页数
    pub fn pages(&self) -> usize {
        self.total.div_ceil(self.chunk.max(1))
    }

    /// 当前页号 (1 起, 空缓冲为 0)
    pub fn current_page(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.index / self.chunk.max(1) + 1
        }
    }

    pub fn registry(&self) -> &Arc<ColumnRegistry> {
        &self.registry
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, i: usize) -> Option<&Row> {
        self.rows.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按列名取缓冲内全部行的单列投影
    pub fn column(&self, name: &str) -> Result<Projection> {
        let remote = self.registry.resolve(name)?.remote.clone();
        let mut values: Vec<Value> = self
            .rows
            .iter()
            .map(|r| r.get(&remote).cloned().unwrap_or(Value::Null))
            .collect();
        if values.len() == 1 {
            Ok(Projection::Scalar(values.remove(0)))
        } else {
            Ok(Projection::List(values))
        }
    }

    /// 输出表格, 限定在注册表的远端名上
    pub fn to_table(&self, shape: TableShape) -> Table {
        let remotes = self.registry.list(NameForm::Remote);
        match shape {
            TableShape::RowMajor => Table::Rows(
                self.rows
                    .iter()
                    .map(|r| {
                        remotes
                            .iter()
                            .map(|name| {
                                (name.clone(), r.get(name).cloned().unwrap_or(Value::Null))
                            })
                            .collect()
                    })
                    .collect(),
            ),
            TableShape::ColumnMajor => Table::Columns(
                remotes
                    .into_iter()
                    .map(|name| {
                        let values = self
                            .rows
                            .iter()
                            .map(|r| r.get(&name).cloned().unwrap_or(Value::Null))
                            .collect();
                        (name, values)
                    })
                    .collect(),
            ),
        }
    }

    /// 行数据的 JSON 表示 (行主序)
    pub fn to_json(&self) -> Result<String> {
        match self.to_table(TableShape::RowMajor) {
            Table::Rows(rows) => {
                serde_json::to_string(&rows).map_err(|e| ResultsError::Persistence {
                    op: "to_json",
                    message: e.to_string(),
                })
            }
            Table::Columns(_) => unreachable!(),
        }
    }

    /// 按列稳定排序, 仅本地缓冲生效
    pub fn sort_in_place(&mut self, name: &str, descending: bool) -> Result<()> {
        let remote = self.registry.resolve(name)?.remote.clone();
        self.rows.sort_by(|a, b| {
            let av = a.get(&remote).unwrap_or(&Value::Null);
            let bv = b.get(&remote).unwrap_or(&Value::Null);
            let ord = cmp_values(av, bv);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        Ok(())
    }

    /// 与另一缓冲按行合并 (同位置行做并集合并)
    ///
    /// 两缓冲行数必须一致; 产生的缓冲使用扩展后的注册表,
    /// 本缓冲与对方都保持不变。
    pub fn merge_with(&self, other: &ResultSet) -> Result<ResultSet> {
        if self.rows.len() != other.rows.len() {
            return Err(ResultsError::RowCountMismatch {
                op: "merge_with",
                message: format!(
                    "buffers hold {} and {} rows",
                    self.rows.len(),
                    other.rows.len()
                ),
            });
        }
        let rows: Vec<Row> = self
            .rows
            .iter()
            .zip(other.rows.iter())
            .map(|(a, b)| row::merge(a, b))
            .collect::<Result<_>>()?;
        let registry = Arc::new(self.registry.extend_with(other.registry.descriptors()));
        Ok(ResultSet::new(
            rows,
            self.index,
            self.total,
            self.chunk,
            registry,
        ))
    }
}

impl Index<usize> for ResultSet {
    type Output = Row;

    fn index(&self, i: usize) -> &Row {
        &self.rows[i]
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<ResultSet(page={}/{}, count_in_page={}, total={})>",
            self.current_page(),
            self.pages(),
            self.count(),
            self.total
        )
    }
}

/// JSON 值的全序比较: null < bool < number < string < array < object
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// 构建缓冲的便捷函数: 原始值行 -> 工厂校验 -> 缓冲
pub fn build_set(
    factory: &RowFactory,
    raw: Vec<Vec<Value>>,
    index: usize,
    total: usize,
    chunk: usize,
    registry: Arc<ColumnRegistry>,
) -> Result<ResultSet> {
    let rows = factory.build_all(raw)?;
    Ok(ResultSet::new(rows, index, total, chunk, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::QueryFingerprint;
    use crate::results::row::RowSchema;
    use serde_json::json;

    fn setup(rows: Vec<Vec<Value>>) -> ResultSet {
        let fp = Arc::new(QueryFingerprint::new(
            "catalog.redshift < 0.1",
            vec!["catalog.redshift".to_string()],
            "DR3",
            None,
        ));
        let registry = Arc::new(ColumnRegistry::with_base(fp.requested_params.clone()));
        let factory = RowFactory::new(Arc::new(RowSchema::new(&registry, fp)));
        let total = rows.len();
        build_set(&factory, rows, 0, total, 10, registry).unwrap()
    }

    fn raw(id: &str, z: f64) -> Vec<Value> {
        vec![json!(id), json!("1-209232"), json!(8485), json!("1901"), json!(z)]
    }

    #[test]
    fn test_column_projection_list_and_scalar() {
        let set = setup(vec![raw("a", 0.1), raw("b", 0.2)]);
        assert_eq!(
            set.column("redshift").unwrap(),
            Projection::List(vec![json!(0.1), json!(0.2)])
        );

        let single = setup(vec![raw("a", 0.1)]);
        assert_eq!(
            single.column("catalog.redshift").unwrap(),
            Projection::Scalar(json!(0.1))
        );
        assert!(single.column("nope").is_err());
    }

    #[test]
    fn test_to_table_shapes() {
        let set = setup(vec![raw("a", 0.1), raw("b", 0.2)]);
        match set.to_table(TableShape::RowMajor) {
            Table::Rows(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0]["object_id"], json!("a"));
                assert_eq!(rows[1]["redshift"], json!(0.2));
            }
            _ => panic!("expected row-major table"),
        }
        match set.to_table(TableShape::ColumnMajor) {
            Table::Columns(cols) => {
                assert_eq!(cols[0].0, "object_id");
                assert_eq!(cols[4], ("redshift".to_string(), vec![json!(0.1), json!(0.2)]));
            }
            _ => panic!("expected column-major table"),
        }
    }

    #[test]
    fn test_sort_in_place_stable_and_descending() {
        let mut set = setup(vec![raw("c", 0.3), raw("a", 0.1), raw("b", 0.3)]);
        set.sort_in_place("redshift", false).unwrap();
        let ids: Vec<_> = set.iter().map(|r| r.identity().clone()).collect();
        // 稳定排序: 两个 0.3 保持输入相对顺序
        assert_eq!(ids, vec![json!("a"), json!("c"), json!("b")]);

        set.sort_in_place("object_id", true).unwrap();
        let ids: Vec<_> = set.iter().map(|r| r.identity().clone()).collect();
        assert_eq!(ids, vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_pages_and_current_page() {
        let mut set = setup(vec![raw("a", 0.1), raw("b", 0.2)]);
        set.total = 25;
        assert_eq!(set.pages(), 3);
        assert_eq!(set.current_page(), 1);
    }

    #[test]
    fn test_merge_with_row_count_mismatch() {
        let a = setup(vec![raw("a", 0.1), raw("b", 0.2)]);
        let b = setup(vec![raw("a", 0.1)]);
        assert!(matches!(
            a.merge_with(&b),
            Err(ResultsError::RowCountMismatch { .. })
        ));
    }
}
