//! Artifact assembler.
//!
//! Serializes every language build, writes the per-language artifacts and
//! `manifest.json` into a staging directory next to the output directory, then
//! swaps the staging directory into place. A failed run leaves the previous
//! output untouched.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use docweave_shared::{
    ArtifactMeta, BuildId, BuildManifest, CURRENT_SCHEMA_VERSION, DocweaveError, MANIFEST_FILE,
    Result, chapters_artifact, search_index_artifact,
};

use crate::pipeline::LanguageBuild;

/// Configuration for one assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Directory receiving the artifacts.
    pub output_dir: PathBuf,
    pub build_id: BuildId,
    pub tool_version: String,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    pub output_dir: PathBuf,
    /// The manifest that was written.
    pub manifest: BuildManifest,
}

/// Write all artifacts for `builds` plus the manifest.
///
/// ```text
/// <output_dir>/
/// ├── manifest.json
/// ├── chapters-en.json
/// ├── search-index-en.json
/// └── ...
/// ```
///
/// Nothing is written at `output_dir` until every artifact and the manifest
/// exist in the staging directory. The previous output directory, if any, is
/// replaced as a whole.
#[instrument(skip_all, fields(out = %config.output_dir.display(), languages = builds.len()))]
pub fn assemble(config: &AssembleConfig, builds: &[LanguageBuild]) -> Result<AssembleResult> {
    let mut files: Vec<(String, String)> = Vec::with_capacity(builds.len() * 2);
    for build in builds {
        files.push((chapters_artifact(&build.code), to_json(&build.chapters)?));
        files.push((search_index_artifact(&build.code), to_json(&build.index)?));
    }

    let parent = parent_dir(&config.output_dir);
    std::fs::create_dir_all(&parent).map_err(|e| DocweaveError::io(&parent, e))?;

    // Removed on drop unless it has been renamed into place.
    let staging = tempfile::Builder::new()
        .prefix(".docweave-staging-")
        .tempdir_in(&parent)
        .map_err(|e| DocweaveError::io(&parent, e))?;

    let mut artifacts = Vec::with_capacity(files.len());
    for (filename, content) in &files {
        artifacts.push(write_artifact(staging.path(), filename, content)?);
    }

    let manifest = BuildManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        build_id: config.build_id.clone(),
        tool_version: config.tool_version.clone(),
        created_at: Utc::now(),
        languages: builds.iter().map(LanguageBuild::summary).collect(),
        artifacts,
    };
    write_artifact(staging.path(), MANIFEST_FILE, &to_json(&manifest)?)?;

    swap_into_place(staging.path(), &config.output_dir)?;

    info!(
        build_id = %manifest.build_id,
        artifacts = manifest.artifacts.len(),
        "assembly complete"
    );

    Ok(AssembleResult {
        output_dir: config.output_dir.clone(),
        manifest,
    })
}

/// Verify that an output directory is well-formed and its artifacts match
/// the checksums recorded in the manifest.
pub fn validate_output(dir: &Path) -> Result<BuildManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(DocweaveError::validation(format!("missing {MANIFEST_FILE}")));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| DocweaveError::io(&manifest_path, e))?;
    let manifest: BuildManifest = serde_json::from_str(&content)
        .map_err(|e| DocweaveError::validation(format!("invalid {MANIFEST_FILE}: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(DocweaveError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    for meta in &manifest.artifacts {
        let path = dir.join(&meta.filename);
        let bytes = std::fs::read(&path).map_err(|e| DocweaveError::io(&path, e))?;
        if sha256_hex(&bytes) != meta.sha256 {
            return Err(DocweaveError::validation(format!(
                "checksum mismatch for {}",
                meta.filename
            )));
        }
    }

    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize to pretty-printed JSON.
fn to_json<T: serde::Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| DocweaveError::validation(format!("JSON serialization failed: {e}")))
}

/// Write one artifact into the staging directory.
fn write_artifact(dir: &Path, filename: &str, content: &str) -> Result<ArtifactMeta> {
    let path = dir.join(filename);
    std::fs::write(&path, content).map_err(|e| DocweaveError::io(&path, e))?;

    debug!(file = %filename, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256: sha256_hex(content.as_bytes()),
        size_bytes: content.len(),
    })
}

/// Replace `out` with the fully written `staging` directory.
///
/// An existing `out` is moved aside first and restored if the second rename
/// fails.
fn swap_into_place(staging: &Path, out: &Path) -> Result<()> {
    if !out.exists() {
        return std::fs::rename(staging, out).map_err(|e| DocweaveError::io(out, e));
    }

    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "content".to_string());
    let previous = parent_dir(out).join(format!(".{name}.previous"));
    if previous.exists() {
        std::fs::remove_dir_all(&previous).map_err(|e| DocweaveError::io(&previous, e))?;
    }

    std::fs::rename(out, &previous).map_err(|e| DocweaveError::io(out, e))?;
    if let Err(e) = std::fs::rename(staging, out) {
        if let Err(restore) = std::fs::rename(&previous, out) {
            warn!(error = %restore, path = %previous.display(), "could not restore previous output");
        }
        return Err(DocweaveError::io(out, e));
    }

    if let Err(e) = std::fs::remove_dir_all(&previous) {
        warn!(error = %e, path = %previous.display(), "could not remove previous output");
    }
    Ok(())
}

/// Directory containing `path`; `.` for a bare relative name.
fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
