// Output publisher: exposition-format text, written to a temp file and renamed over the output.
// Readers of the output path only ever see a complete snapshot.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::RunOutput;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("can't create temp file in {dir}: {source}")]
    CreateTemp { dir: PathBuf, source: io::Error },

    #[error("can't write temp file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("can't rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("publish task failed: {0}")]
    Join(String),
}

/// Writes every metric as a gauge block. Returns the number of point lines written.
pub fn render<W: Write>(output: &RunOutput, w: &mut W) -> io::Result<usize> {
    let mut lines = 0;
    for (name, points) in output {
        if points.is_empty() {
            continue;
        }
        writeln!(w, "# TYPE {} gauge", name)?;
        for p in points {
            writeln!(w, "{} {:.6} {}", p.series, p.value, p.timestamp_ms)?;
            lines += 1;
        }
    }
    Ok(lines)
}

#[derive(Debug, Clone)]
pub struct Publisher {
    path: PathBuf,
}

impl Publisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the output file with `output`. Returns the number of points written.
    /// On any error the temp file is removed and the previous output is left untouched.
    #[instrument(skip(self, output), fields(path = %self.path.display(), metrics = output.len()))]
    pub fn publish(&self, output: &RunOutput) -> Result<usize, PublishError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!(
            "{}_",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".into())
        );

        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let tmp = builder
            .tempfile_in(&dir)
            .map_err(|source| PublishError::CreateTemp {
                dir: dir.clone(),
                source,
            })?;
        let tmp_path = tmp.path().to_path_buf();

        let written = write_and_sync(tmp.as_file(), output).map_err(|source| {
            PublishError::Write {
                path: tmp_path.clone(),
                source,
            }
        })?;

        // persist() renames; a failed rename drops (and deletes) the temp file
        tmp.persist(&self.path)
            .map_err(|e| PublishError::Rename {
                from: tmp_path,
                to: self.path.clone(),
                source: e.error,
            })?;

        debug!(points = written, "output file replaced");
        Ok(written)
    }

    /// Runs [`Publisher::publish`] on the blocking pool.
    pub async fn publish_blocking(&self, output: RunOutput) -> Result<usize, PublishError> {
        let publisher = self.clone();
        tokio::task::spawn_blocking(move || publisher.publish(&output))
            .await
            .map_err(|e| PublishError::Join(e.to_string()))?
    }
}

fn write_and_sync(file: &File, output: &RunOutput) -> io::Result<usize> {
    let mut w = BufWriter::new(file);
    let written = render(output, &mut w)?;
    w.flush()?;
    drop(w);
    file.sync_all()?;
    Ok(written)
}
