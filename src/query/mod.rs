// 查询层 - 指纹与列注册表
//
// ┌──────────────────────────────────────────────┐
// │                Query Layer                   │
// │                                              │
// │  QueryFingerprint ──┐                        │
// │                     ├──> ColumnRegistry      │
// │  requested_params ──┘    (4 种名称形式解析)   │
// └──────────────────────────────────────────────┘

pub mod columns;
pub mod types;

pub use columns::{ColumnDescriptor, ColumnRegistry, NameForm, BASE_COLUMNS, IDENTITY_COLUMN};
pub use types::{Mode, QueryFingerprint, QueryRuntime, SortDirection, SortState};
