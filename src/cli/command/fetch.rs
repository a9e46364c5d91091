//! Downloads every chunk from the Climate Data Store.

use std::fs;

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use tracing::info;

use crate::{
    cds::{CdsClient, CdsConfig},
    config::Settings,
    dispatch::{default_workers, dispatch, plan, ChunkOutcome},
    request::Retrieve,
};

pub async fn fetch(
    settings: &Settings,
    variable: &str,
    workers: Option<usize>,
) -> Result<Vec<ChunkOutcome>> {
    let config = CdsConfig::load().context("Failed to load CDS API credentials")?;
    let client = CdsClient::new(config)?;
    let workers = workers.unwrap_or_else(default_workers);

    fetch_with(&client, settings, variable, workers, &MultiProgress::new()).await
}

/// Fetches with any retriever, outcomes ordered by first year.
pub async fn fetch_with<R: Retrieve + ?Sized>(
    retriever: &R,
    settings: &Settings,
    variable: &str,
    workers: usize,
    progress: &MultiProgress,
) -> Result<Vec<ChunkOutcome>> {
    fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "Failed to create output directory `{}`",
            settings.output_dir.display()
        )
    })?;

    let chunks = plan(variable);
    info!(variable = %variable, chunks = chunks.len(), workers, "Starting retrieval");

    let mut outcomes = dispatch(retriever, settings, chunks, workers, progress).await;
    outcomes.sort_by(|a, b| a.chunk.years.first().cmp(&b.chunk.years.first()));

    Ok(outcomes)
}

// -- Tests -------------------------------------------------------------------
