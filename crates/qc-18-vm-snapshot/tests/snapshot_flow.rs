//! End-to-end snapshot export/import through the mock host and controller.

use qc_18_vm_snapshot::codec::{decode_payload, encode_manifest, sanitize_artifact_name};
use qc_18_vm_snapshot::{
    init_test_logging, BufferedPayloadReader, BufferedPayloadWriter, DataEntry, ExportManifest,
    ExtensionSnapshotter, MockController, MockSnapshotHost, MockStoreExporter, SnapshotError,
    SnapshotPhase, SnapshotRequest, VmSnapshotApi, VmSnapshotConfig, VmSnapshotter,
    EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Node {
    snapshotter: VmSnapshotter,
    host: Arc<MockSnapshotHost>,
    controller: Arc<MockController>,
    exporter: Arc<MockStoreExporter>,
    dir: TempDir,
}

impl Node {
    fn new(host: MockSnapshotHost) -> Self {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(host);
        let controller = Arc::new(MockController::new());
        let exporter = Arc::new(MockStoreExporter::new(vec![
            DataEntry::new("vm.export.kv.a", "{\"n\":1}"),
            DataEntry::new("vm.export.kv.b", ""),
        ]));
        let snapshotter = VmSnapshotter::new(
            VmSnapshotConfig::for_testing(dir.path().join("restore")),
            host.clone(),
            exporter.clone(),
            controller.clone(),
        );
        host.register_extension(Arc::new(snapshotter.clone()));
        Self {
            snapshotter,
            host,
            controller,
            exporter,
            dir,
        }
    }

    /// Lay out a controller export and point the controller at it.
    fn stage_export(&self, height: u64, artifacts: &[(&str, &str, &[u8])]) -> PathBuf {
        let export = self.dir.path().join(format!("export-{height}"));
        write_export(&export, height, artifacts);
        self.controller.set_export_dir(&export);
        export
    }
}

fn write_export(dir: &Path, height: u64, artifacts: &[(&str, &str, &[u8])]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut manifest = ExportManifest::new(height);
    for (name, file, data) in artifacts {
        std::fs::write(dir.join(file), data).unwrap();
        manifest
            .artifacts
            .push((name.to_string(), file.to_string()));
    }
    std::fs::write(
        dir.join(EXPORT_MANIFEST_FILENAME),
        encode_manifest(&manifest).unwrap(),
    )
    .unwrap();
}

#[tokio::test]
async fn test_second_initiate_rejected_while_first_in_flight() {
    let node = Node::new(MockSnapshotHost::new());
    node.stage_export(10, &[("foo", "0-foo", b"DATA")]);
    node.controller.hold_initiate();

    node.snapshotter.initiate_snapshot(10).unwrap();
    let err = node.snapshotter.initiate_snapshot(11).unwrap_err();
    assert!(matches!(err, SnapshotError::AlreadyInProgress { height: 10 }));
    assert!(err.is_precondition());
    assert_eq!(node.snapshotter.active_height(), Some(10));

    node.controller.release_initiate();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    assert_eq!(node.host.snapshot_calls(), vec![10]);
    assert_eq!(node.host.payloads().len(), 1);
    assert!(node
        .controller
        .actions()
        .iter()
        .all(|action| action.block_height == 10));
}

#[tokio::test]
async fn test_repeated_wait_after_success() {
    let node = Node::new(MockSnapshotHost::new());
    node.stage_export(20, &[]);

    node.snapshotter.initiate_snapshot(20).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
}

#[tokio::test]
async fn test_repeated_wait_after_initiate_failure() {
    let node = Node::new(MockSnapshotHost::new());
    node.controller.fail_on(SnapshotRequest::Initiate);

    node.snapshotter.initiate_snapshot(30).unwrap();
    let first = node.snapshotter.wait_until_snapshot_started().await;
    assert!(matches!(first, Err(SnapshotError::Transport(_))));

    let second = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        node.snapshotter.wait_until_snapshot_started(),
    )
    .await
    .expect("second wait must not block");
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_initiate_failure_leaves_no_active_snapshot() {
    let node = Node::new(MockSnapshotHost::new());
    node.controller.fail_on(SnapshotRequest::Initiate);

    node.snapshotter.initiate_snapshot(40).unwrap();
    assert!(node.snapshotter.wait_until_snapshot_started().await.is_err());
    node.snapshotter.wait_until_snapshot_finished().await;

    let mut writer = BufferedPayloadWriter::default();
    let err = node
        .snapshotter
        .snapshot_extension(40, &mut writer)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::NoActiveSnapshot));
    assert!(node.host.snapshot_calls().is_empty());
    assert_eq!(node.controller.requests(), vec![SnapshotRequest::Initiate]);

    // The slot is free again.
    node.controller.set_export_dir(node.dir.path().join("unused"));
    node.snapshotter.initiate_snapshot(41).unwrap();
    assert_eq!(node.snapshotter.active_height(), Some(41));
}

#[tokio::test]
async fn test_export_then_restore_reconstructs_staging() {
    let exporting = Node::new(MockSnapshotHost::new());
    exporting.stage_export(
        50,
        &[
            ("bundle/main.zip", "0-bundle", b"zip bytes"),
            ("transcript 1", "1-transcript", b"\x00\x01\x02"),
        ],
    );

    exporting.snapshotter.initiate_snapshot(50).unwrap();
    exporting.snapshotter.wait_until_snapshot_started().await.unwrap();
    exporting.snapshotter.wait_until_snapshot_finished().await;
    let payloads = exporting.host.payloads();
    assert_eq!(payloads.len(), 2);

    let restoring = Node::new(MockSnapshotHost::new());
    let mut reader = BufferedPayloadReader::new(payloads);
    restoring
        .snapshotter
        .restore_extension(50, 1, &mut reader)
        .await
        .unwrap();

    let imports = restoring.controller.imports();
    assert_eq!(imports.len(), 1);
    let import = &imports[0];
    assert_eq!(import.manifest.block_height, 50);
    assert_eq!(import.manifest.artifact_count(), 2);
    assert_eq!(import.manifest.data.as_deref(), Some(EXPORT_DATA_FILENAME));
    assert_eq!(import.data, restoring.exporter.entries());
    assert_eq!(
        import.artifacts,
        vec![
            ("bundle/main.zip".to_string(), b"zip bytes".to_vec()),
            ("transcript 1".to_string(), b"\x00\x01\x02".to_vec()),
        ]
    );
    assert_eq!(
        import.manifest.artifacts[0].1,
        "0-bundle-main.zip".to_string()
    );
    assert!(!import.staging_dir.exists());
    assert_eq!(
        restoring.controller.requests(),
        vec![SnapshotRequest::Restore]
    );
}

#[test]
fn test_sanitize_artifact_names() {
    assert_eq!(sanitize_artifact_name("a/b c.bin"), "a-b-c.bin");
    for name in ["a/b c.bin", "../etc/passwd", "ünïcödé", "", "ok-name_1.txt"] {
        let once = sanitize_artifact_name(name);
        assert_eq!(sanitize_artifact_name(&once), once);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_single_artifact() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.stage_export(100, &[("foo", "0-foo", b"DATA")]);

    node.snapshotter.initiate_snapshot(100).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    let payloads = node.host.payloads();
    assert_eq!(payloads.len(), 1);
    let payload = decode_payload(&payloads[0]).unwrap();
    assert_eq!(payload.name, "foo");
    assert_eq!(payload.data, b"DATA");

    assert_eq!(
        node.controller.requests(),
        vec![SnapshotRequest::Initiate, SnapshotRequest::Retrieve]
    );
    assert_eq!(node.snapshotter.phase(), SnapshotPhase::Idle);
    assert!(!export.exists());
}

#[tokio::test]
async fn test_mismatched_height_never_reaches_controller() {
    let host = MockSnapshotHost::new();
    host.hold_snapshots();
    let node = Node::new(host);
    node.stage_export(100, &[("foo", "0-foo", b"DATA")]);

    node.snapshotter.initiate_snapshot(100).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    assert_eq!(node.snapshotter.phase(), SnapshotPhase::Started);

    let mut writer = BufferedPayloadWriter::default();
    let err = node
        .snapshotter
        .snapshot_extension(101, &mut writer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::UnexpectedHeight {
            requested: 101,
            expected: 100
        }
    ));
    assert!(writer.is_empty());
    assert_eq!(node.controller.requests(), vec![SnapshotRequest::Initiate]);
    assert_eq!(node.snapshotter.phase(), SnapshotPhase::Started);

    node.host.release_snapshot();
    node.snapshotter.wait_until_snapshot_finished().await;
    assert_eq!(
        node.controller.requests(),
        vec![SnapshotRequest::Initiate, SnapshotRequest::Retrieve]
    );
    assert_eq!(node.host.payloads().len(), 1);
}

#[tokio::test]
async fn test_retrieve_failure_discards() {
    let node = Node::new(MockSnapshotHost::new());
    node.stage_export(60, &[("foo", "0-foo", b"DATA")]);
    node.controller.fail_on(SnapshotRequest::Retrieve);

    node.snapshotter.initiate_snapshot(60).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    assert!(node.host.payloads().is_empty());
    assert_eq!(
        node.controller.requests(),
        vec![
            SnapshotRequest::Initiate,
            SnapshotRequest::Retrieve,
            SnapshotRequest::Discard
        ]
    );
    assert_eq!(node.snapshotter.active_height(), None);
}

#[tokio::test]
async fn test_discard_failure_is_not_escalated() {
    let host = MockSnapshotHost::new();
    host.skip_extension();
    let node = Node::new(host);
    node.controller.fail_on(SnapshotRequest::Discard);

    node.snapshotter.initiate_snapshot(70).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    assert_eq!(node.snapshotter.phase(), SnapshotPhase::Idle);
    node.controller.set_export_dir(node.dir.path().join("unused"));
    node.snapshotter.initiate_snapshot(71).unwrap();
}

#[tokio::test]
async fn test_manifest_with_null_artifacts() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.dir.path().join("null-export");
    std::fs::create_dir_all(&export).unwrap();
    std::fs::write(
        export.join(EXPORT_MANIFEST_FILENAME),
        br#"{"blockHeight":80,"data":"ignored.jsonl","artifacts":null}"#,
    )
    .unwrap();
    node.controller.set_export_dir(&export);

    node.snapshotter.initiate_snapshot(80).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    assert!(node.host.payloads().is_empty());
    assert_eq!(
        node.controller.requests(),
        vec![SnapshotRequest::Initiate, SnapshotRequest::Retrieve]
    );
    assert!(!export.exists());
}

/// Run one snapshot to completion and assert it was discarded after retrieve.
async fn assert_retrieval_discarded(node: &Node, height: u64) {
    node.snapshotter.initiate_snapshot(height).unwrap();
    node.snapshotter.wait_until_snapshot_started().await.unwrap();
    node.snapshotter.wait_until_snapshot_finished().await;

    assert!(node.host.payloads().is_empty());
    assert_eq!(
        node.controller.requests(),
        vec![
            SnapshotRequest::Initiate,
            SnapshotRequest::Retrieve,
            SnapshotRequest::Discard
        ]
    );
    assert_eq!(node.snapshotter.active_height(), None);
    assert_eq!(node.snapshotter.phase(), SnapshotPhase::Idle);
}

#[tokio::test]
async fn test_missing_artifact_file_discards() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.stage_export(9, &[("a", "0-a", b"present")]);
    let mut manifest = ExportManifest::new(9);
    manifest.artifacts = vec![
        ("a".to_string(), "0-a".to_string()),
        ("b".to_string(), "missing".to_string()),
    ];
    std::fs::write(
        export.join(EXPORT_MANIFEST_FILENAME),
        encode_manifest(&manifest).unwrap(),
    )
    .unwrap();

    assert_retrieval_discarded(&node, 9).await;
    assert!(!export.exists());
}

#[tokio::test]
async fn test_non_json_retrieve_reply_discards() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.stage_export(90, &[("foo", "0-foo", b"DATA")]);
    node.controller
        .set_retrieve_reply(export.to_string_lossy().into_owned());

    assert_retrieval_discarded(&node, 90).await;
}

#[tokio::test]
async fn test_malformed_manifest_discards() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.stage_export(91, &[("foo", "0-foo", b"DATA")]);
    std::fs::write(export.join(EXPORT_MANIFEST_FILENAME), b"{\"blockHeight\":").unwrap();

    assert_retrieval_discarded(&node, 91).await;
    assert!(!export.exists());
}

#[tokio::test]
async fn test_missing_manifest_discards() {
    let node = Node::new(MockSnapshotHost::new());
    let export = node.stage_export(92, &[("foo", "0-foo", b"DATA")]);
    std::fs::remove_file(export.join(EXPORT_MANIFEST_FILENAME)).unwrap();

    assert_retrieval_discarded(&node, 92).await;
    assert!(!export.exists());
}

#[tokio::test]
async fn test_restore_with_failing_exporter_leaves_no_staging_dir() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let controller = Arc::new(MockController::new());
    let snapshotter = VmSnapshotter::new(
        VmSnapshotConfig::for_testing(dir.path().join("restore")),
        Arc::new(MockSnapshotHost::new()),
        Arc::new(MockStoreExporter::failing()),
        controller.clone(),
    );

    let mut reader = BufferedPayloadReader::new(Vec::new());
    let err = snapshotter
        .restore_extension(93, 1, &mut reader)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Host(_)));
    assert!(controller.actions().is_empty());
    assert_eq!(
        std::fs::read_dir(dir.path().join("restore")).unwrap().count(),
        0
    );
}
