// 会话持久化端到端测试
//
// 保存 -> 恢复的完整回路: 归档前后指纹/列/行/窗口状态一致, 恢复出的
// 控制器不持有任何活的查询句柄, 重新挂接策略后可以继续导航。

use serde_json::{json, Value};
use starquery::{
    MemoryQuery, Mode, QueryFingerprint, RecordingSink, Results, ResultsBuilder, ResultsError,
    ResultsWarning, SortDirection,
};
use std::path::PathBuf;

const TOTAL: usize = 24;

fn dataset(n: usize) -> Vec<Vec<Value>> {
    (0..n)
        .map(|i| {
            vec![
                json!(format!("obj-{:03}", i)),
                json!(format!("1-2092{:02}", i)),
                json!(8485 + i),
                json!("1901"),
                json!(0.3 - i as f64 * 0.001),
            ]
        })
        .collect()
}

fn fingerprint() -> QueryFingerprint {
    QueryFingerprint::new(
        "catalog.redshift < 0.3",
        vec!["catalog.redshift".to_string()],
        "DR3",
        None,
    )
}

fn local_results(sink: RecordingSink) -> Results {
    let _ = env_logger::builder().is_test(true).try_init();
    let rows = dataset(TOTAL);
    let first_page = rows[..8].to_vec();
    let query = MemoryQuery::new(rows, "SELECT * FROM targets WHERE redshift < 0.3");
    ResultsBuilder::new(fingerprint(), first_page)
        .total(TOTAL)
        .chunk(8)
        .local(Box::new(query))
        .sink(Box::new(sink))
        .build()
        .unwrap()
}

#[test]
fn test_save_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut original = local_results(RecordingSink::new());
    original.sort("catalog.redshift", SortDirection::Asc).unwrap();
    let written = original.save(Some(&path), false).unwrap();
    assert_eq!(written, Some(path.clone()));

    // 保存后原控制器丢弃了本地句柄, 查询归一化为字面 SQL
    assert!(original.is_detached());
    assert_eq!(
        original.show_query(),
        "SELECT * FROM targets WHERE redshift < 0.3"
    );

    let restored = Results::restore(&path, false).unwrap();
    assert_eq!(restored.fingerprint(), original.fingerprint());
    assert_eq!(restored.count(), original.count());
    assert_eq!(restored.total(), TOTAL);
    assert_eq!(restored.window(), original.window());
    assert_eq!(restored.mode(), Mode::Local);
    assert_eq!(restored.sort_state(), original.sort_state());
    assert_eq!(
        restored.registry().descriptors(),
        original.registry().descriptors()
    );
    for (a, b) in restored.set().iter().zip(original.set().iter()) {
        assert_eq!(a.values(), b.values());
    }
    assert_eq!(
        restored.show_query(),
        "SELECT * FROM targets WHERE redshift < 0.3"
    );
    assert!(restored.is_detached());
}

#[test]
fn test_restored_session_navigates_after_reattach() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    local_results(RecordingSink::new())
        .save(Some(&path), false)
        .unwrap();
    let mut restored = Results::restore(&path, false).unwrap();

    // 未挂接策略时导航是致命错误
    assert!(matches!(
        restored.next(None),
        Err(ResultsError::Detached { op: "next" })
    ));

    restored.attach_local(Box::new(MemoryQuery::new(dataset(TOTAL), "SELECT 1")));
    restored.next(None).unwrap();
    assert_eq!(restored.window(), (8, 16));
    assert_eq!(restored.set()[0].identity(), &json!("obj-008"));
}

#[test]
fn test_overwrite_refused_without_permission() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let sink = RecordingSink::new();
    let mut r = local_results(sink.clone());

    assert!(r.save(Some(&path), false).unwrap().is_some());
    // 第二次保存未授权覆盖: 只告警, 不报错, 不返回路径
    assert_eq!(r.save(Some(&path), false).unwrap(), None);
    assert!(matches!(
        sink.warnings()[0],
        ResultsWarning::OverwriteRefused { .. }
    ));

    assert!(r.save(Some(&path), true).unwrap().is_some());
}

#[test]
fn test_save_appends_extension_and_creates_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep").join("nested").join("session");
    let mut r = local_results(RecordingSink::new());

    let written = r.save(Some(&path), false).unwrap().unwrap();
    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("json"));
    assert!(written.exists());
}

#[test]
fn test_save_rejects_directory_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.json");
    std::fs::create_dir(&path).unwrap();

    let mut r = local_results(RecordingSink::new());
    assert!(matches!(
        r.save(Some(&path), true),
        Err(ResultsError::Persistence { op: "save", .. })
    ));
}

#[test]
fn test_restore_with_delete_removes_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    local_results(RecordingSink::new())
        .save(Some(&path), false)
        .unwrap();
    let restored = Results::restore(&path, true).unwrap();
    assert_eq!(restored.total(), TOTAL);
    assert!(!path.exists());
}

#[test]
fn test_restore_missing_file_is_persistence_error() {
    let missing = PathBuf::from("/nonexistent/starquery/session.json");
    assert!(matches!(
        Results::restore(&missing, false),
        Err(ResultsError::Persistence { op: "restore", .. })
    ));
}
