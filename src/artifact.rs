use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::{Path, PathBuf};
use tokio::{
    fs as tokio_fs,
    io::{AsyncWriteExt, BufWriter as TokioBufWriter},
};

use crate::error::EtlError;
use crate::source::Hit;

/// A JSON file written for one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Path of the JSON file for an index
pub fn artifact_path(dir: &Path, index: &str) -> Result<PathBuf, EtlError> {
    if index.is_empty() || index.contains(&['/', '\\'][..]) || index == "." || index == ".." {
        return Err(EtlError::Artifact {
            path: dir.join(index).display().to_string(),
            reason: "index name is not a valid file name".to_string(),
        });
    }
    Ok(dir.join(format!("{}.json", index)))
}

/// Serialize the `_source` payloads as a JSON array, four-space indented.
///
/// Non-ASCII text is written as-is.
pub fn render_sources(hits: &[Hit]) -> Result<Vec<u8>, serde_json::Error> {
    let sources: Vec<_> = hits.iter().map(|hit| &hit.source).collect();

    let mut buffer = Vec::with_capacity(hits.len() * 256);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    sources.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Write `<dir>/<index>.json`, replacing any previous file
pub async fn write_json_artifact(
    dir: &Path,
    index: &str,
    hits: &[Hit],
) -> Result<Artifact, EtlError> {
    let path = artifact_path(dir, index)?;
    let fail = |reason: String| EtlError::Artifact {
        path: path.display().to_string(),
        reason,
    };

    let buffer = render_sources(hits).map_err(|e| fail(e.to_string()))?;

    tokio_fs::create_dir_all(dir)
        .await
        .map_err(|e| fail(format!("cannot create {}: {}", dir.display(), e)))?;

    let file = tokio_fs::File::create(&path)
        .await
        .map_err(|e| fail(e.to_string()))?;
    let mut writer = TokioBufWriter::new(file);
    writer
        .write_all(&buffer)
        .await
        .map_err(|e| fail(e.to_string()))?;
    writer.flush().await.map_err(|e| fail(e.to_string()))?;

    log::info!("{}: saved {} documents to {}", index, hits.len(), path.display());

    Ok(Artifact {
        path,
        bytes: buffer.len() as u64,
    })
}
