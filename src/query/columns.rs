//! 列注册表 - 逻辑参数名到物理/显示/远端名的解析
//!
//! 每个查询指纹对应一个不可变的 [`ColumnRegistry`], 按注册顺序保存
//! [`ColumnDescriptor`]。任意一种名称形式 (full/remote/display/short)
//! 都可以用来查找列。

use serde::{Deserialize, Serialize};

use crate::{Result, ResultsError};

/// 行基础字段 (身份字段), 任何行模式中始终存在且排在最前
pub const BASE_COLUMNS: [&str; 4] = ["object_id", "catalog_id", "field_id", "target_name"];

/// 行身份键 - 合并两行时用来判定是否同一对象
pub const IDENTITY_COLUMN: &str = "object_id";

/// 列名形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameForm {
    /// 完整限定名, 如 `catalog.redshift`
    Full,
    /// 远端传输名 (也是行字段名), 如 `redshift`
    Remote,
    /// 展示名, 如 `Redshift`
    Display,
    /// 短名 (末段), 如 `redshift`
    Short,
}

/// 列描述符 - 一个请求参数的四种名称形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub full: String,
    pub remote: String,
    pub display: String,
    pub short: String,
}

impl ColumnDescriptor {
    /// 从完整限定名推导其余形式
    ///
    /// 短名取最后一个点号段, 远端名默认与短名一致 (注册表在远端名冲突时
    /// 回退为下划线连接的限定形式), 展示名为短名的标题化写法。
    pub fn from_full(full: &str) -> Self {
        let short = full.rsplit('.').next().unwrap_or(full).to_string();
        let display = titleize(&short);
        Self {
            full: full.to_string(),
            remote: short.clone(),
            display,
            short,
        }
    }

    /// 取指定形式的名称
    pub fn name(&self, form: NameForm) -> &str {
        match form {
            NameForm::Full => &self.full,
            NameForm::Remote => &self.remote,
            NameForm::Display => &self.display,
            NameForm::Short => &self.short,
        }
    }

    fn matches(&self, name: &str) -> bool {
        name == self.full || name == self.remote || name == self.display || name == self.short
    }
}

fn titleize(name: &str) -> String {
    name.split(['_', '.'])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 列注册表
///
/// 构造后不可变; 行合并引入新列时通过 [`ColumnRegistry::extend_with`]
/// 产生新的注册表, 绝不原地修改。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnRegistry {
    /// 由完整限定名列表构造
    ///
    /// 远端名冲突时, 后注册的列回退为 `a.b` -> `a_b` 的限定形式。
    pub fn from_full_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = ColumnRegistry::default();
        for name in names {
            registry.push(ColumnDescriptor::from_full(name.as_ref()));
        }
        registry
    }

    /// 构造带基础身份列的注册表: 基础列在前, 请求参数在后
    pub fn with_base<I, S>(requested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::from_full_names(BASE_COLUMNS);
        for name in requested {
            let name = name.as_ref();
            if registry.columns.iter().any(|c| c.full == name) {
                continue;
            }
            registry.push(ColumnDescriptor::from_full(name));
        }
        registry
    }

    /// 由既有描述符重建 (归档恢复路径)
    pub fn from_descriptors(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    fn push(&mut self, mut descriptor: ColumnDescriptor) {
        if self.columns.iter().any(|c| c.remote == descriptor.remote) {
            descriptor.remote = descriptor.full.replace('.', "_");
        }
        self.columns.push(descriptor);
    }

    /// 按任意名称形式解析列
    pub fn resolve(&self, name: &str) -> Result<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.matches(name))
            .ok_or_else(|| ResultsError::UnknownColumn {
                name: name.to_string(),
            })
    }

    /// 解析并返回指定形式的名称
    pub fn resolve_form(&self, name: &str, form: NameForm) -> Result<String> {
        Ok(self.resolve(name)?.name(form).to_string())
    }

    /// 按注册顺序列出指定形式的名称
    pub fn list(&self, form: NameForm) -> Vec<String> {
        self.columns.iter().map(|c| c.name(form).to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.matches(name))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// 与另一组远端名逐一比较 (合并前的兼容性检查)
    pub fn same_columns(&self, remote_names: &[String]) -> bool {
        self.list(NameForm::Remote) == remote_names
    }

    /// 追加新列产生扩展后的注册表, 已存在的完整名跳过
    pub fn extend_with(&self, extra: &[ColumnDescriptor]) -> ColumnRegistry {
        let mut registry = self.clone();
        for descriptor in extra {
            if registry.columns.iter().any(|c| c.full == descriptor.full) {
                continue;
            }
            registry.push(descriptor.clone());
        }
        registry
    }
}
