use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod export;
pub mod types;

pub use export::{
    render_author_matrix, render_documents, render_top_per_year, render_year_trends,
};
pub use types::ExportFormat;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown export format {0:?} (expected csv, json or markdown)")]
    UnknownFormat(String),
}

/// Write rendered output to `path`, creating parent directories as needed.
pub fn write_to_path(content: &str, path: &Path) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)?;
    tracing::info!(path = %path.display(), bytes = content.len(), "report written");
    Ok(())
}
