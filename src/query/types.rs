//! 查询层类型定义 - 指纹/排序/执行模式/耗时

use serde::{Deserialize, Serialize};

/// 查询指纹
///
/// 一个逻辑查询的身份: 过滤表达式 + 请求参数 + 数据发布版本 + 行数上限。
/// 控制器构造后不可变, 合并校验以指纹相等为前提 —— 不同指纹的行绝不
/// 允许静默合并。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFingerprint {
    /// 过滤表达式, 如 `catalog.redshift < 0.1`
    pub search_filter: String,

    /// 请求参数 (完整限定名), 按请求顺序
    pub requested_params: Vec<String>,

    /// 数据发布版本标签
    pub release: String,

    /// 行数上限 (远端每次请求携带)
    pub row_limit: Option<usize>,
}

impl QueryFingerprint {
    pub fn new(
        search_filter: impl Into<String>,
        requested_params: Vec<String>,
        release: impl Into<String>,
        row_limit: Option<usize>,
    ) -> Self {
        Self {
            search_filter: search_filter.into(),
            requested_params,
            release: release.into(),
            row_limit,
        }
    }

    /// 请求参数的 CSV 形式 (远端协议使用)
    pub fn params_csv(&self) -> String {
        self.requested_params.join(",")
    }

    /// 默认归档文件名词干: 去空白的过滤表达式, 空过滤为 `anon`
    pub fn archive_stem(&self) -> String {
        let stem: String = self
            .search_filter
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if stem.is_empty() {
            "anon".to_string()
        } else {
            stem
        }
    }
}

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 本地数据源直连
    Local,
    /// 远端服务
    Remote,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }
}

/// 当前排序状态
///
/// 远端模式下每次导航请求都要重新携带; 本地模式排序原地生效,
/// 顺序隐式保持。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    /// 排序列 (远端名)
    pub column: String,
    pub direction: SortDirection,
}

/// 查询耗时 - 远端协议返回的 `{days, seconds, microseconds}` 记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRuntime {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub microseconds: i64,
}

impl QueryRuntime {
    pub fn to_duration(&self) -> chrono::Duration {
        chrono::Duration::days(self.days)
            + chrono::Duration::seconds(self.seconds)
            + chrono::Duration::microseconds(self.microseconds)
    }
}
