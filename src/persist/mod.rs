//! 会话持久化 - 版本化快照归档
//!
//! 控制器的公开状态序列化为单文件 JSON 归档: 指纹、列描述符、原始行值、
//! 窗口状态、排序与转换配置。查询对象归一化为字面 SQL 字符串, 活的本地
//! 查询句柄不进入归档 (恢复后必须为空)。快照结构与控制器类型解耦,
//! 带显式版本号。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::columns::ColumnDescriptor;
use crate::query::types::{Mode, QueryFingerprint, SortState};
use crate::results::convert::ToolKind;
use crate::{Result, ResultsError};

/// 归档格式版本
pub const SNAPSHOT_VERSION: u32 = 1;

/// 归档文件扩展名
pub const ARCHIVE_EXTENSION: &str = "json";

/// 控制器快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub version: u32,
    pub fingerprint: QueryFingerprint,
    pub columns: Vec<ColumnDescriptor>,
    /// 缓冲的原始行值 (恢复时经行工厂重建)
    pub rows: Vec<Vec<Value>>,
    pub start: usize,
    pub end: usize,
    pub chunk: usize,
    pub total: usize,
    pub mode: Mode,
    pub sort: Option<SortState>,
    pub return_kind: Option<ToolKind>,
    /// 字面 SQL 形式的查询 (归一化后)
    pub query_sql: Option<String>,
}

/// 由指纹推导默认归档路径 (当前目录)
pub fn default_archive_path(fingerprint: &QueryFingerprint) -> PathBuf {
    PathBuf::from(format!(
        "starquery_results_{}.{}",
        fingerprint.archive_stem(),
        ARCHIVE_EXTENSION
    ))
}

/// 无扩展名时补全归档扩展名
pub fn ensure_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.with_extension(ARCHIVE_EXTENSION)
    } else {
        path
    }
}

/// 写入快照
///
/// 自动创建缺失的父目录; 序列化或写盘失败时删除写了一半的文件再上抛。
pub fn write_snapshot(path: &Path, snapshot: &ResultsSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ResultsError::Persistence {
                op: "save",
                message: format!("cannot create '{}': {}", parent.display(), e),
            })?;
        }
    }

    let write = || -> std::result::Result<(), String> {
        let file = fs::File::create(path).map_err(|e| e.to_string())?;
        serde_json::to_writer(file, snapshot).map_err(|e| e.to_string())
    };

    if let Err(message) = write() {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
        return Err(ResultsError::Persistence {
            op: "save",
            message,
        });
    }
    Ok(())
}

/// 读取快照, `delete` 为真时在成功读取后删除归档文件
pub fn read_snapshot(path: &Path, delete: bool) -> Result<ResultsSnapshot> {
    let data = fs::read(path).map_err(|e| ResultsError::Persistence {
        op: "restore",
        message: format!("cannot read '{}': {}", path.display(), e),
    })?;

    let snapshot: ResultsSnapshot =
        serde_json::from_slice(&data).map_err(|e| ResultsError::Persistence {
            op: "restore",
            message: e.to_string(),
        })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(ResultsError::Persistence {
            op: "restore",
            message: format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            ),
        });
    }

    if delete {
        fs::remove_file(path).map_err(|e| ResultsError::Persistence {
            op: "restore",
            message: format!("cannot delete '{}': {}", path.display(), e),
        })?;
    }

    Ok(snapshot)
}
