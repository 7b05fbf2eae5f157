//! Filesystem reporter
//!
//! ```text
//! <reports_dir>/
//! └── <cycle>/
//!     ├── payouts.json   PayoutReport[] appended per batch
//!     ├── invalid.json   PayoutRecipe[] that were never sent
//!     └── summary.json   CyclePayoutSummary
//! ```
//!
//! Files are replaced through a temporary sibling so a crash never leaves a
//! truncated report behind.

use super::{recipes_by_cycle, reports_by_cycle};
use bakepay_core::engines::Reporter;
use bakepay_core::{CyclePayoutSummary, PayoutRecipe, PayoutReport, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PAYOUTS_FILE: &str = "payouts.json";
const INVALID_FILE: &str = "invalid.json";
const SUMMARY_FILE: &str = "summary.json";

pub struct FsReporter {
    reports_dir: PathBuf,
    dry_run: bool,
    /// Serializes read-modify-write of report files
    write_lock: Mutex<()>,
}

impl FsReporter {
    pub fn new(reports_dir: impl AsRef<Path>) -> Self {
        Self {
            reports_dir: reports_dir.as_ref().to_path_buf(),
            dry_run: false,
            write_lock: Mutex::new(()),
        }
    }

    /// Log instead of writing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cycle_dir(&self, cycle: i64) -> PathBuf {
        self.reports_dir.join(cycle.to_string())
    }

    fn append<T: Serialize + DeserializeOwned>(&self, cycle: i64, file: &str, records: Vec<T>) -> Result<()> {
        let path = self.cycle_dir(cycle).join(file);
        if self.dry_run {
            info!(cycle, path = %path.display(), records = records.len(), "Dry run, report not written");
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let mut existing: Vec<T> = read_json(&path)?.unwrap_or_default();
        existing.extend(records);
        write_json(&path, &existing)?;
        debug!(cycle, path = %path.display(), records = existing.len(), "Report written");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl Reporter for FsReporter {
    fn get_existing_reports(&self, cycle: i64) -> Result<Vec<PayoutReport>> {
        Ok(read_json(&self.cycle_dir(cycle).join(PAYOUTS_FILE))?.unwrap_or_default())
    }

    fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()> {
        for (cycle, reports) in reports_by_cycle(reports) {
            self.append(cycle, PAYOUTS_FILE, reports)?;
        }
        Ok(())
    }

    fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()> {
        for (cycle, recipes) in recipes_by_cycle(recipes) {
            self.append(cycle, INVALID_FILE, recipes)?;
        }
        Ok(())
    }

    fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()> {
        let path = self.cycle_dir(summary.cycle).join(SUMMARY_FILE);
        if self.dry_run {
            info!(cycle = summary.cycle, path = %path.display(), "Dry run, summary not written");
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        write_json(&path, summary)
    }

    fn get_existing_cycle_summary(&self, cycle: i64) -> Result<Option<CyclePayoutSummary>> {
        read_json(&self.cycle_dir(cycle).join(SUMMARY_FILE))
    }
}
