//! Reporters
//!
//! - [`FsReporter`] - JSON files per cycle under a reports directory
//! - [`MemoryReporter`] - process memory, for tests and dry runs
//! - [`StdioReporter`] - human readable lines on a writer, persists nothing

mod fs;
mod memory;
mod stdio;

pub use fs::FsReporter;
pub use memory::MemoryReporter;
pub use stdio::StdioReporter;

use bakepay_core::{PayoutRecipe, PayoutReport};
use std::collections::BTreeMap;

/// Reports grouped by cycle, cycles ascending
pub(crate) fn reports_by_cycle(reports: &[PayoutReport]) -> BTreeMap<i64, Vec<PayoutReport>> {
    let mut grouped: BTreeMap<i64, Vec<PayoutReport>> = BTreeMap::new();
    for report in reports {
        grouped.entry(report.cycle).or_default().push(report.clone());
    }
    grouped
}

pub(crate) fn recipes_by_cycle(recipes: &[PayoutRecipe]) -> BTreeMap<i64, Vec<PayoutRecipe>> {
    let mut grouped: BTreeMap<i64, Vec<PayoutRecipe>> = BTreeMap::new();
    for recipe in recipes {
        grouped.entry(recipe.cycle).or_default().push(recipe.clone());
    }
    grouped
}
