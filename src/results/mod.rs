// 结果引擎 - 行模式/页缓冲/控制器/工具转换
//
// ┌────────────────────────────────────────────────────────┐
// │                   Results (门面)                        │
// │   翻页 / 排序 / 子集 / 合并 / 持久化 / 工具转换            │
// │        │                                               │
// │  ┌─────▼─────┐   ┌───────────┐   ┌──────────────┐      │
// │  │ ResultSet │──>│ Row/Schema │  │ DatasetObject │     │
// │  │ (页缓冲)   │   │ (行工厂)   │   │ (惰性转换)     │     │
// │  └───────────┘   └───────────┘   └──────────────┘      │
// └────────────────────────────────────────────────────────┘

pub mod controller;
pub mod convert;
pub mod row;
pub mod set;

pub use controller::{Results, ResultsBuilder, MAX_UNPAGINATED_COLUMNS, MAX_UNPAGINATED_ROWS};
pub use convert::{convert, DatasetObject, ToolKind, TOOL_KINDS};
pub use row::{merge, Row, RowFactory, RowSchema};
pub use set::{build_set, cmp_values, Projection, ResultSet, Table, TableShape};
