//! JSON persistence of plans.

use std::fs;
use std::path::Path;

use super::error::PlanFileError;
use super::validate::validate_plan;
use super::DownloadPlan;
use crate::storage;

/// Writes `plan` as pretty JSON to `dest`, creating parent directories.
///
/// The file is written to a `.part` sibling first and renamed into place, so
/// an interrupted write never leaves a truncated plan behind.
pub fn write_plan(plan: &DownloadPlan, dest: &Path) -> Result<(), PlanFileError> {
    validate_plan(plan).map_err(|reason| PlanFileError::malformed(dest, reason))?;
    let mut json = serde_json::to_vec_pretty(plan)
        .map_err(|e| PlanFileError::malformed(dest, e.to_string()))?;
    json.push(b'\n');

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PlanFileError::io(parent, e))?;
    }
    storage::write_atomic(dest, &json).map_err(|e| PlanFileError::io(dest, e))?;
    tracing::debug!(path = %dest.display(), entries = plan.entries.len(), "plan written");
    Ok(())
}

/// Reads and validates a plan. Missing fields, duplicate paths and unsafe
/// paths are reported as [`PlanFileError::Malformed`].
pub fn read_plan(src: &Path) -> Result<DownloadPlan, PlanFileError> {
    let data = fs::read(src).map_err(|e| PlanFileError::io(src, e))?;
    let plan: DownloadPlan =
        serde_json::from_slice(&data).map_err(|e| PlanFileError::malformed(src, e.to_string()))?;
    validate_plan(&plan).map_err(|reason| PlanFileError::malformed(src, reason))?;
    Ok(plan)
}
