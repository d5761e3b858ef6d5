//! 行模式与行工厂
//!
//! 每个查询在运行期确定字段集, 用模式描述符 (有序字段名列表) 配合
//! 有序值容器表示行, 命名访问一律经过模式而非动态属性。行一经构造
//! 不可变, 仅 [`merge`] 显式产生新行。

use std::sync::Arc;

use serde_json::Value;

use crate::query::columns::{ColumnRegistry, NameForm, BASE_COLUMNS, IDENTITY_COLUMN};
use crate::query::types::QueryFingerprint;
use crate::{Result, ResultsError};

/// 行模式 - 有序字段名 + 所属查询指纹
///
/// 字段集 = 基础身份字段在前 + 注册表远端名中的其余字段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    fields: Vec<String>,
    fingerprint: Arc<QueryFingerprint>,
}

impl RowSchema {
    /// 由列注册表派生行模式
    pub fn new(registry: &ColumnRegistry, fingerprint: Arc<QueryFingerprint>) -> Self {
        let mut fields: Vec<String> = BASE_COLUMNS.iter().map(|s| s.to_string()).collect();
        for remote in registry.list(NameForm::Remote) {
            if !fields.contains(&remote) {
                fields.push(remote);
            }
        }
        Self {
            fields,
            fingerprint,
        }
    }

    /// 由既有字段列表构造 (行合并的并集模式)
    pub fn from_fields(fields: Vec<String>, fingerprint: Arc<QueryFingerprint>) -> Self {
        Self {
            fields,
            fingerprint,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    pub fn fingerprint(&self) -> &Arc<QueryFingerprint> {
        &self.fingerprint
    }
}

/// 结果行 - 固定字段数的命名记录
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: Arc<RowSchema>,
    values: Vec<Value>,
}

impl Row {
    /// 按字段名取值
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.schema.position(field).map(|i| &self.values[i])
    }

    /// 行身份键 (`object_id`) 的值
    pub fn identity(&self) -> &Value {
        self.get(IDENTITY_COLUMN).unwrap_or(&Value::Null)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// 行的 (字段名, 值) 映射, 按模式顺序
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        self.schema
            .fields
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// 行工厂 - 按模式校验并构造行
#[derive(Debug, Clone)]
pub struct RowFactory {
    schema: Arc<RowSchema>,
}

impl RowFactory {
    pub fn new(schema: Arc<RowSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// 构造一行, 值数必须与字段数一致
    pub fn build(&self, values: Vec<Value>) -> Result<Row> {
        if values.len() != self.schema.field_count() {
            return Err(ResultsError::SchemaMismatch {
                op: "build",
                expected: self.schema.field_count(),
                got: values.len(),
            });
        }
        Ok(Row {
            schema: self.schema.clone(),
            values,
        })
    }

    /// 批量构造
    pub fn build_all(&self, raw: Vec<Vec<Value>>) -> Result<Vec<Row>> {
        raw.into_iter().map(|values| self.build(values)).collect()
    }
}

/// 合并两行为一行
///
/// 前置条件: 两行来自同一查询指纹, 且身份键相同。结果字段集为两者的
/// 有序并集, 字段名冲突时取 `b` 的值; 输入行保持不变。
pub fn merge(a: &Row, b: &Row) -> Result<Row> {
    if a.schema.fingerprint != b.schema.fingerprint {
        return Err(ResultsError::FingerprintMismatch { op: "merge" });
    }
    if a.identity() != b.identity() {
        return Err(ResultsError::IdentityMismatch {
            op: "merge",
            left: a.identity().to_string(),
            right: b.identity().to_string(),
        });
    }

    let mut fields: Vec<String> = a.schema.fields.clone();
    let mut values: Vec<Value> = a.values.clone();
    for (field, value) in b.schema.fields.iter().zip(b.values.iter()) {
        match fields.iter().position(|f| f == field) {
            Some(i) => values[i] = value.clone(),
            None => {
                fields.push(field.clone());
                values.push(value.clone());
            }
        }
    }

    let schema = Arc::new(RowSchema::from_fields(fields, a.schema.fingerprint.clone()));
    Ok(Row { schema, values })
}
