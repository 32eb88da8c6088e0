//! Bulk copy job: copy a caller-chosen subset of tracks to a destination
//! folder, streaming progress to the requesting connection only.

use std::path::PathBuf;

use crate::server::protocol::Outbound;
use crate::server::session::ClientHandle;

/// Copy `sources` into `destination` in order. Per-file failures are logged
/// and skipped; the batch continues. After every attempted file a progress
/// percentage is emitted, so the sequence is monotone and ends at 100. The
/// terminal event carries the count actually copied.
pub async fn run_copy_job(destination: PathBuf, sources: Vec<PathBuf>, sink: ClientHandle) {
    if let Err(e) = tokio::fs::create_dir_all(&destination).await {
        tracing::warn!(
            "Cannot create copy destination {}: {}",
            destination.display(),
            e
        );
        sink.send(Outbound::CopyComplete { copied: 0 }.to_json());
        return;
    }

    let total = sources.len();
    let mut copied = 0usize;
    for (index, source) in sources.iter().enumerate() {
        match source.file_name() {
            Some(name) => match tokio::fs::copy(source, destination.join(name)).await {
                Ok(_) => copied += 1,
                Err(e) => {
                    tracing::warn!("Failed to copy {}: {}", source.display(), e);
                }
            },
            None => {
                tracing::warn!("Skipping copy source without a filename: {}", source.display());
            }
        }
        // progress counts attempts, not successes — it must reach 100 even
        // when some files are skipped
        let progress = (((index + 1) as f64 / total as f64) * 100.0).round() as u32;
        sink.send(Outbound::CopyProgress { progress }.to_json());
    }

    tracing::info!(
        "Copied {}/{} files to {}",
        copied,
        total,
        destination.display()
    );
    sink.send(Outbound::CopyComplete { copied }.to_json());
}
