//! Streams a download to disk.
//!
//! Data is written next to the target as `<target>.partial` and only renamed
//! into place once the whole stream has arrived with the expected length.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Error, Result};
use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Download truncated: expected {expected} bytes, got {written}")]
pub struct Truncated {
    pub expected: u64,
    pub written: u64,
}

/// `<target>.partial`, in the same directory so the rename stays on one filesystem.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut file_name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    file_name.push(".partial");

    target.with_file_name(file_name)
}

/// Saves `stream` to `target`. On any error, including a length different from
/// `expected`, nothing is left at `target` and the partial file is removed.
pub async fn save_verified<S, B, E>(
    stream: S,
    target: &Path,
    expected: Option<u64>,
    progress_bar: &ProgressBar,
) -> Result<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let partial = partial_path(target);

    let result = async {
        let written = save_stream(stream, &partial, progress_bar).await?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(Truncated { expected, written }.into());
            }
        }

        fs::rename(&partial, target).map_err(|e| {
            Error::msg(format!("Failed to move download to `{}`: {}", target.display(), e))
        })?;

        Ok::<u64, Error>(written)
    }
    .await;

    if result.is_err() && partial.exists() {
        fs::remove_file(&partial).ok();
    }

    result
}

/// Switches a spinner to a byte progress bar once the size is known.
pub fn show_download_size(progress_bar: &ProgressBar, total_size: u64) -> Result<()> {
    progress_bar.set_length(total_size);
    progress_bar.set_position(0);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
        )?
        .progress_chars("=> "),
    );

    Ok(())
}

/// Writes every chunk of `stream` to `file_path`, returning the byte count.
pub async fn save_stream<S, B, E>(stream: S, file_path: &Path, progress_bar: &ProgressBar) -> Result<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = File::create(file_path)
        .map_err(|e| Error::msg(format!("Failed to create `{}`: {}", file_path.display(), e)))?;
    let mut downloaded = 0u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes)?;
        downloaded += bytes.len() as u64;
        progress_bar.set_position(downloaded);
    }

    file.flush()?;

    Ok(downloaded)
}

// -- Tests -------------------------------------------------------------------
