//! Export of resolved tournament questions for offline evaluation

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::metaculus::MetaculusClient;

/// Where the export for `tournament_id` is written
pub fn export_path(dir: &Path, tournament_id: &str) -> PathBuf {
    let slug: String = tournament_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{}_resolved_questions.json", slug))
}

/// Write resolved, non-annulled questions to disk. Existing exports are
/// left alone. Returns the path and whether a file was written.
pub async fn export_resolved(
    client: &MetaculusClient,
    tournament_id: &str,
    dir: &Path,
) -> Result<(PathBuf, bool)> {
    let path = export_path(dir, tournament_id);
    if tokio::fs::try_exists(&path).await? {
        tracing::info!(path = %path.display(), "Export already exists, skipping");
        return Ok((path, false));
    }

    let questions = client.list_resolved_questions(tournament_id).await?;
    let body = serde_json::to_string_pretty(&questions)?;

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, body).await?;
    tracing::info!(
        path = %path.display(),
        questions = questions.len(),
        "Exported resolved questions"
    );
    Ok((path, true))
}
