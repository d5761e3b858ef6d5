//! 工具转换 - 结果行到领域对象描述符
//!
//! 转换是惰性批处理: 每次缓冲刷新后整体执行一次, 产生与缓冲平行的
//! 有序对象序列, 绝不修改缓冲本身。需要次级维度 (分箱/模板轴) 的
//! 对象种类只在注册表含有对应列时携带这些构造参数, 缺列直接省略。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::columns::{ColumnRegistry, IDENTITY_COLUMN};
use crate::query::types::Mode;
use crate::results::set::ResultSet;
use crate::{Result, ResultsError};

/// 分箱轴列 (完整限定名)
pub const BINNING_COLUMN: &str = "binning.name";
/// 模板轴列
pub const TEMPLATE_COLUMN: &str = "template.name";
/// 光谱定位列
pub const SPECTRUM_X_COLUMN: &str = "spectrum.x";
pub const SPECTRUM_Y_COLUMN: &str = "spectrum.y";

/// 领域对象种类 (封闭集合)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Cube,
    Map,
    Spectrum,
    Model,
    Image,
}

pub const TOOL_KINDS: [ToolKind; 5] = [
    ToolKind::Cube,
    ToolKind::Map,
    ToolKind::Spectrum,
    ToolKind::Model,
    ToolKind::Image,
];

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Cube => "cube",
            ToolKind::Map => "map",
            ToolKind::Spectrum => "spectrum",
            ToolKind::Model => "model",
            ToolKind::Image => "image",
        }
    }

    /// 从字符串解析, 集合之外报 `InvalidToolKind`
    pub fn parse(kind: &str) -> Result<ToolKind> {
        TOOL_KINDS
            .iter()
            .copied()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| ResultsError::InvalidToolKind {
                kind: kind.to_string(),
                allowed: TOOL_KINDS
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// 领域对象描述符
///
/// 惰性构造的占位: 携带重建真实工具对象所需的全部参数。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetObject {
    pub kind: ToolKind,
    pub object_id: String,
    pub mode: Mode,
    /// 分箱轴 (仅 Map/Model, 且注册表含对应列时)
    pub binning: Option<String>,
    /// 模板轴 (仅 Map/Model, 且注册表含对应列时)
    pub template: Option<String>,
    /// 光谱定位 (仅 Spectrum)
    pub position: Option<(f64, f64)>,
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 把缓冲的前 `limit` 行转换为领域对象
pub fn convert(
    set: &ResultSet,
    registry: &ColumnRegistry,
    kind: ToolKind,
    mode: Mode,
    limit: Option<usize>,
) -> Result<Vec<DatasetObject>> {
    let cap = limit.unwrap_or(set.count()).min(set.count());

    // 次级维度列: 存在则逐行携带, 缺失不是错误
    let binning_remote = match kind {
        ToolKind::Map | ToolKind::Model => registry
            .resolve(BINNING_COLUMN)
            .ok()
            .map(|c| c.remote.clone()),
        _ => None,
    };
    let template_remote = match kind {
        ToolKind::Map | ToolKind::Model => registry
            .resolve(TEMPLATE_COLUMN)
            .ok()
            .map(|c| c.remote.clone()),
        _ => None,
    };

    // 光谱种类必须有定位列
    let spectrum_remotes = if kind == ToolKind::Spectrum {
        let x = registry.resolve(SPECTRUM_X_COLUMN)?.remote.clone();
        let y = registry.resolve(SPECTRUM_Y_COLUMN)?.remote.clone();
        Some((x, y))
    } else {
        None
    };

    let mut objects = Vec::with_capacity(cap);
    for row in set.rows().iter().take(cap) {
        let object_id = text(row.get(IDENTITY_COLUMN).unwrap_or(&Value::Null));
        let binning = binning_remote
            .as_deref()
            .and_then(|name| row.get(name))
            .map(text);
        let template = template_remote
            .as_deref()
            .and_then(|name| row.get(name))
            .map(text);
        let position = spectrum_remotes.as_ref().and_then(|(x, y)| {
            let xv = row.get(x).and_then(Value::as_f64);
            let yv = row.get(y).and_then(Value::as_f64);
            match (xv, yv) {
                (Some(xv), Some(yv)) => Some((xv, yv)),
                _ => None,
            }
        });

        objects.push(DatasetObject {
            kind,
            object_id,
            mode,
            binning,
            template,
            position,
        });
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::QueryFingerprint;
    use crate::results::row::{RowFactory, RowSchema};
    use crate::results::set::build_set;
    use serde_json::json;
    use std::sync::Arc;

    fn set_with(params: Vec<&str>, raw: Vec<Vec<Value>>) -> (ResultSet, Arc<ColumnRegistry>) {
        let fp = Arc::new(QueryFingerprint::new(
            "f",
            params.iter().map(|s| s.to_string()).collect(),
            "DR3",
            None,
        ));
        let registry = Arc::new(ColumnRegistry::with_base(fp.requested_params.clone()));
        let factory = RowFactory::new(Arc::new(RowSchema::new(&registry, fp)));
        let total = raw.len();
        let set = build_set(&factory, raw, 0, total, 10, registry.clone()).unwrap();
        (set, registry)
    }

    fn base(id: &str) -> Vec<Value> {
        vec![json!(id), json!("1-209232"), json!(8485), json!("1901")]
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(ToolKind::parse("cube").is_ok());
        match ToolKind::parse("galaxy") {
            Err(ResultsError::InvalidToolKind { kind, allowed }) => {
                assert_eq!(kind, "galaxy");
                assert!(allowed.contains("cube"));
            }
            other => panic!("expected invalid kind, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_map_carries_axes_when_columns_present() {
        let mut r1 = base("8485-1901");
        r1.extend([json!("VOR10"), json!("GAU-MILESHC")]);
        let (set, registry) = set_with(vec![BINNING_COLUMN, TEMPLATE_COLUMN], vec![r1]);

        let objects = convert(&set, &registry, ToolKind::Map, Mode::Local, None).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].binning.as_deref(), Some("VOR10"));
        assert_eq!(objects[0].template.as_deref(), Some("GAU-MILESHC"));
    }

    #[test]
    fn test_map_omits_axes_when_columns_absent() {
        let (set, registry) = set_with(vec![], vec![base("8485-1901")]);
        let objects = convert(&set, &registry, ToolKind::Map, Mode::Remote, None).unwrap();
        assert_eq!(objects[0].binning, None);
        assert_eq!(objects[0].template, None);
        assert_eq!(objects[0].mode, Mode::Remote);
    }

    #[test]
    fn test_spectrum_requires_position_columns() {
        let (set, registry) = set_with(vec![], vec![base("8485-1901")]);
        assert!(matches!(
            convert(&set, &registry, ToolKind::Spectrum, Mode::Local, None),
            Err(ResultsError::UnknownColumn { .. })
        ));

        let mut r1 = base("8485-1901");
        r1.extend([json!(17.0), json!(21.0)]);
        let (set, registry) = set_with(vec![SPECTRUM_X_COLUMN, SPECTRUM_Y_COLUMN], vec![r1]);
        let objects = convert(&set, &registry, ToolKind::Spectrum, Mode::Local, None).unwrap();
        assert_eq!(objects[0].position, Some((17.0, 21.0)));
    }

    #[test]
    fn test_limit_caps_converted_rows() {
        let (set, registry) = set_with(vec![], vec![base("a"), base("b"), base("c")]);
        let objects = convert(&set, &registry, ToolKind::Cube, Mode::Local, Some(2)).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].object_id, "a");
        // 缓冲自身不受影响
        assert_eq!(set.count(), 3);
    }
}
