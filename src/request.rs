//! Builds the CDS request for one chunk of years and hands it to a retriever.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveTime;
use indicatif::ProgressBar;
use serde::Serialize;

use crate::config::Settings;

/// Fetches one request and saves the result to `target`.
#[async_trait]
pub trait Retrieve: Send + Sync {
    async fn retrieve(
        &self,
        dataset: &str,
        request: &RequestPayload,
        target: &Path,
        progress: &ProgressBar,
    ) -> Result<()>;
}

/// A contiguous run of years and the variable to fetch for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub years: Vec<String>,
    pub variable: String,
}

impl Chunk {
    pub fn new(years: Vec<String>, variable: &str) -> Self {
        Chunk {
            years,
            variable: variable.to_string(),
        }
    }

    /// Splits a year list with the variable name appended as its last element.
    #[cfg(test)]
    pub fn from_tagged(mut tagged: Vec<String>) -> Result<Self> {
        let variable = tagged
            .pop()
            .ok_or_else(|| anyhow!("Chunk is empty, expected years followed by a variable"))?;

        if tagged.is_empty() {
            return Err(anyhow!("Chunk for `{}` has no years", variable));
        }

        Ok(Chunk {
            years: tagged,
            variable,
        })
    }

    /// First and last year of the chunk.
    pub fn year_range(&self) -> Option<(&str, &str)> {
        match (self.years.first(), self.years.last()) {
            (Some(first), Some(last)) => Some((first, last)),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self.year_range() {
            Some((first, last)) => format!("{}-{}", first, last),
            None => "(no years)".to_string(),
        }
    }
}

/// Area as `[north, west, south, east]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f64; 4]")]
pub struct BoundingBox {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.north, b.west, b.south, b.east]
    }
}

/// The JSON body posted to the CDS for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPayload {
    pub product_type: String,
    pub variable: String,
    pub year: Vec<String>,
    pub month: Vec<String>,
    pub day: Vec<String>,
    pub time: Vec<String>,
    pub area: BoundingBox,
    pub format: String,
}

impl RequestPayload {
    pub fn new(settings: &Settings, chunk: &Chunk) -> Self {
        RequestPayload {
            product_type: settings.product_type.clone(),
            variable: chunk.variable.clone(),
            year: chunk.years.clone(),
            month: months(),
            day: days(),
            time: hours(),
            area: settings.area,
            format: settings.format.clone(),
        }
    }

    /// Short description for progress output, e.g. `skin_temperature 1979-1990`.
    pub fn describe(&self) -> String {
        match (self.year.first(), self.year.last()) {
            (Some(first), Some(last)) => format!("{} {}-{}", self.variable, first, last),
            _ => self.variable.clone(),
        }
    }
}

fn months() -> Vec<String> {
    (1..=12).map(|m| format!("{:02}", m)).collect()
}

// Every day is requested, the server skips dates that don't exist.
fn days() -> Vec<String> {
    (1..=31).map(|d| format!("{:02}", d)).collect()
}

fn hours() -> Vec<String> {
    (0..24)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .map(|t| t.format("%H:%M").to_string())
        .collect()
}

/// Path the chunk's data is written to.
pub fn output_path(settings: &Settings, chunk: &Chunk) -> Result<PathBuf> {
    let (first, last) = chunk
        .year_range()
        .ok_or_else(|| anyhow!("Chunk for `{}` has no years", chunk.variable))?;

    let file_name = format!(
        "ERA5_{}_{}_{}-{}.nc",
        chunk.variable, settings.area_name, first, last
    );

    Ok(settings.output_dir.join(file_name))
}

/// Builds the request for `chunk` and retrieves it. Returns the saved file.
pub async fn fetch_chunk<R: Retrieve + ?Sized>(
    retriever: &R,
    settings: &Settings,
    chunk: &Chunk,
    progress: &ProgressBar,
) -> Result<PathBuf> {
    let payload = RequestPayload::new(settings, chunk);
    let target = output_path(settings, chunk)?;

    retriever
        .retrieve(&settings.dataset, &payload, &target, progress)
        .await
        .with_context(|| format!("Failed to retrieve `{}` for {}", chunk.variable, chunk.label()))?;

    Ok(target)
}

// -- Tests -------------------------------------------------------------------
