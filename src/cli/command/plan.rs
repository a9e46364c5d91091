//! Shows the requests a fetch would send, without contacting the server.

use anyhow::Result;
use serde_json::{json, Value};

use crate::{
    config::Settings,
    dispatch,
    request::{output_path, RequestPayload},
};

pub fn plan(settings: &Settings, variable: &str) -> Result<String> {
    let requests = dispatch::plan(variable)
        .iter()
        .map(|chunk| -> Result<Value> {
            Ok(json!({
                "dataset": settings.dataset,
                "target": output_path(settings, chunk)?,
                "request": RequestPayload::new(settings, chunk),
            }))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(serde_json::to_string_pretty(&requests)?)
}

// -- Tests -------------------------------------------------------------------
