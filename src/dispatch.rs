//! Splits the download into chunks and runs them concurrently.

use std::{num::NonZeroUsize, path::PathBuf, thread};

use anyhow::Result;
use futures::{stream, StreamExt};
use indicatif::MultiProgress;
use tracing::{error, info};

use crate::{
    cli::create_spinner,
    config::{Settings, CHUNK_BOUNDARIES},
    request::{fetch_chunk, Chunk, Retrieve},
};

/// Result of retrieving one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub result: Result<PathBuf>,
}

/// Splits the full year range at the chunk boundaries.
pub fn partition_years() -> Vec<Vec<String>> {
    CHUNK_BOUNDARIES
        .windows(2)
        .map(|w| (w[0]..w[1]).map(|year| year.to_string()).collect())
        .collect()
}

/// One chunk per year range, all for `variable`.
pub fn plan(variable: &str) -> Vec<Chunk> {
    partition_years()
        .into_iter()
        .map(|years| Chunk::new(years, variable))
        .collect()
}

/// Number of chunks run at once unless told otherwise.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Retrieves every chunk with at most `workers` in flight and waits for all
/// of them. A failed chunk does not stop the others.
pub async fn dispatch<R: Retrieve + ?Sized>(
    retriever: &R,
    settings: &Settings,
    chunks: Vec<Chunk>,
    workers: usize,
    progress: &MultiProgress,
) -> Vec<ChunkOutcome> {
    stream::iter(chunks)
        .map(|chunk| async move {
            let label = format!("{} {}", chunk.variable, chunk.label());
            let bar = progress.add(create_spinner(format!("{}: submitting...", label)));

            let result = fetch_chunk(retriever, settings, &chunk, &bar).await;

            match &result {
                Ok(path) => {
                    info!(chunk = %label, path = %path.display(), "Chunk retrieved");
                    bar.finish_with_message(format!("{}: saved", label));
                }
                Err(e) => {
                    let cause = format!("{:#}", e);
                    error!(chunk = %label, error = %cause, "Chunk failed");
                    bar.abandon_with_message(format!("{}: failed", label));
                }
            }

            ChunkOutcome { chunk, result }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

// -- Tests -------------------------------------------------------------------
