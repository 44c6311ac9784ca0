//! On-disk record of what each output is showing.
//!
//! One JSON file per display, rewritten after every successful wallpaper
//! swap. Writes go through a temp file and rename so a crash mid-write can
//! never leave a torn record behind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub display: String,
    pub path: String,
    pub mode: String,
    #[serde(default)]
    pub cycle_index: usize,
    #[serde(default)]
    pub cycle_count: usize,
    pub status: String,
    pub updated: String,
}

/// RFC 3339 wall-clock stamp for record fields.
pub fn timestamp_now() -> String {
    match OffsetDateTime::now_utc().format(&Rfc3339) {
        Ok(s) => s,
        Err(_) => "unknown".to_string(),
    }
}

fn sanitize(display: &str) -> String {
    display
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Record path for one display inside the state directory.
pub fn state_file(dir: &Path, display: &str) -> PathBuf {
    dir.join(format!("{}.json", sanitize(display)))
}

pub fn write_record(dir: &Path, record: &StateRecord) -> Result<(), RenderError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| RenderError::Io { path: dir.to_path_buf(), source: e })?;
    let path = state_file(dir, &record.display);
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| RenderError::Json { path: path.clone(), source: e })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| RenderError::Io { path: tmp.clone(), source: e })?;
    std::fs::rename(&tmp, &path).map_err(|e| RenderError::Io { path: path.clone(), source: e })?;
    Ok(())
}

pub fn read_record(dir: &Path, display: &str) -> Result<StateRecord, RenderError> {
    let path = state_file(dir, display);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| RenderError::Io { path: path.clone(), source: e })?;
    serde_json::from_str(&text).map_err(|e| RenderError::Json { path, source: e })
}
