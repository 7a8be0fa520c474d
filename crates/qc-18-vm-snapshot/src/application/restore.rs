//! Restore: stage the extension payloads plus the trusted host data, then
//! hand the directory to the controller.

use super::action_channel::ActionChannel;
use super::staging::{
    close_restore_dir, create_restore_dir, staged_file_options, write_staged_file,
};
use crate::codec::{decode_payload, encode_data_entries, encode_manifest, staged_filename};
use crate::config::VmSnapshotConfig;
use crate::domain::{
    ExportManifest, SnapshotAction, SnapshotError, SnapshotRequest, StateView,
    EXPORT_DATA_FILENAME, EXPORT_MANIFEST_FILENAME,
};
use crate::ports::inbound::ExtensionPayloadReader;
use crate::ports::outbound::{SnapshotHost, StoreExporter};
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Everything a restore needs from the snapshotter.
pub(crate) struct RestoreContext<'a> {
    pub(crate) config: &'a VmSnapshotConfig,
    pub(crate) host: &'a dyn SnapshotHost,
    pub(crate) exporter: &'a dyn StoreExporter,
    pub(crate) channel: &'a ActionChannel,
}

impl RestoreContext<'_> {
    /// Stage every payload of `reader` for `height` and ask the controller
    /// to import it. Returns the number of artifacts staged.
    ///
    /// The staging directory is removed on return, whatever the outcome.
    pub(crate) async fn restore(
        &self,
        height: u64,
        reader: &mut dyn ExtensionPayloadReader,
    ) -> Result<usize, SnapshotError> {
        let view = self.host.read_only_view(height);

        let staging = create_restore_dir(
            self.config.staging_root_or_temp(),
            format!("{}-{}-", self.config.restore_dir_prefix, height),
        )
        .await?;
        debug!("[qc-18] Staging restore in {}", staging.path().display());

        let result = self.stage_and_send(staging.path(), &view, reader).await;
        close_restore_dir(staging).await;
        result
    }

    async fn stage_and_send(
        &self,
        dir: &Path,
        view: &StateView,
        reader: &mut dyn ExtensionPayloadReader,
    ) -> Result<usize, SnapshotError> {
        let height = view.height;
        let mut manifest = ExportManifest::new(height);
        manifest.data = Some(EXPORT_DATA_FILENAME.to_string());

        let entries = self.exporter.export_vm_store(view)?;
        let mut data_file = staged_file_options()
            .open(dir.join(EXPORT_DATA_FILENAME))
            .await?;
        data_file.write_all(&encode_data_entries(&entries)?).await?;
        data_file.flush().await?;
        data_file.sync_all().await?;
        drop(data_file);
        debug!("[qc-18] Staged {} trusted data entries", entries.len());

        while let Some(bytes) = reader.read().await? {
            let payload = decode_payload(&bytes)?;
            let filename = staged_filename(manifest.artifacts.len(), &payload.name);
            write_staged_file(&dir.join(&filename), &payload.data).await?;
            manifest.artifacts.push((payload.name, filename));
        }

        write_staged_file(&dir.join(EXPORT_MANIFEST_FILENAME), &encode_manifest(&manifest)?).await?;

        let dir = dir.to_str().ok_or_else(|| {
            SnapshotError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "staging path is not valid UTF-8",
            ))
        })?;
        let action = SnapshotAction::new(height, SnapshotRequest::Restore)
            .with_args(vec![serde_json::Value::String(dir.to_string())]);
        self.channel.send(&action).await?;

        info!(
            "[qc-18] Restored VM snapshot with {} artifacts",
            manifest.artifact_count()
        );
        Ok(manifest.artifact_count())
    }
}
