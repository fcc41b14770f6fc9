// ============================================================
// Layer 4 — Validity Filter
// ============================================================
// Decides which rows of a raw preference dataset are usable.
//
// Rule per row, using the template's OPTIONAL checks:
//
//   no equality check             → keep
//   check_equal(row) == true      → keep
//   check_equal(row) == false
//       validation check present
//       and check_validation(row)
//       == false                  → drop
//       otherwise                 → keep
//
// Rows are visited by index through the dataset handle, so
// nothing beyond what the handle itself holds is materialised.
// The result preserves the original relative order.
//
// Every worker filters the whole dataset and gets the same
// index list; ExecutionContext::shard then hands each rank one
// contiguous, disjoint slice of it.
//
// Reference: Burn Book §4 (Dataset trait)

use std::ops::Range;

use burn::data::dataset::Dataset;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::error::{PipelineError, Result};
use crate::domain::record::RawRecord;
use crate::domain::traits::PreferenceTemplate;

// ─── ExecutionContext ─────────────────────────────────────────────────────────
/// Which worker this process is, passed in explicitly rather than
/// read from global state. Only the main worker draws progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    rank:       usize,
    world_size: usize,
}

impl ExecutionContext {
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 {
            return Err(PipelineError::config("world size must be positive"));
        }
        if rank >= world_size {
            return Err(PipelineError::config(format!(
                "rank {rank} is out of range for world size {world_size}"
            )));
        }
        Ok(Self { rank, world_size })
    }

    pub fn single() -> Self {
        Self { rank: 0, world_size: 1 }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// This rank's slice of `0..len`. Slices are contiguous, disjoint,
    /// and together cover `0..len`; earlier ranks get the remainder.
    pub fn shard_range(&self, len: usize) -> Range<usize> {
        let base  = len / self.world_size;
        let extra = len % self.world_size;
        let start = self.rank * base + self.rank.min(extra);
        let size  = base + usize::from(self.rank < extra);
        start..start + size
    }

    /// This rank's share of `items`.
    pub fn shard<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items[self.shard_range(items.len())].to_vec()
    }

    pub fn is_main(&self) -> bool {
        self.rank == 0
    }

    /// Progress bar visible on the main worker, hidden elsewhere.
    pub fn progress(&self, len: usize, message: &'static str) -> ProgressBar {
        if !self.is_main() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(message);
        bar
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::single()
    }
}

/// Whether one record passes the template's checks.
pub fn is_valid(template: &dyn PreferenceTemplate, record: &RawRecord) -> bool {
    let Some(equality) = template.equality_check() else {
        return true;
    };
    if equality.check(record) {
        return true;
    }
    match template.validation_check() {
        Some(validation) => validation.check(record),
        None => true,
    }
}

/// Indices of all valid rows, in dataset order.
pub fn filter_indices<D>(
    dataset:  &D,
    template: &dyn PreferenceTemplate,
    ctx:      &ExecutionContext,
) -> Vec<usize>
where
    D: Dataset<RawRecord> + ?Sized,
{
    let total = dataset.len();
    let bar   = ctx.progress(total, "Filtering valid indices");

    let valid = (0..total)
        .filter(|&i| {
            bar.inc(1);
            dataset.get(i).is_some_and(|record| is_valid(template, &record))
        })
        .collect();

    bar.finish_and_clear();
    valid
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::InMemDataset;
    use serde_json::json;

    use crate::data::template::{FieldTemplate, FieldTemplateConfig};

    fn template(equal: bool, valid: bool) -> FieldTemplate {
        FieldTemplate::new(FieldTemplateConfig {
            prompt_key:    "prompt".into(),
            prompt_format: "{input}".into(),
            better_key:    "better".into(),
            worse_key:     "worse".into(),
            equal_key:     equal.then(|| "eq".to_string()),
            valid_key:     valid.then(|| "ok".to_string()),
        })
    }

    fn rows() -> InMemDataset<RawRecord> {
        InMemDataset::new(vec![
            RawRecord::from_value(json!({"eq": true,  "ok": false})), // 0
            RawRecord::from_value(json!({"eq": false, "ok": false})), // 1
            RawRecord::from_value(json!({"eq": false, "ok": true})),  // 2
            RawRecord::from_value(json!({})),                         // 3
        ])
    }

    #[test]
    fn test_no_equality_check_keeps_everything() {
        let idx = filter_indices(&rows(), &template(false, true), &ExecutionContext::single());
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_equality_without_validation_keeps_everything() {
        let idx = filter_indices(&rows(), &template(true, false), &ExecutionContext::single());
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failed_equality_falls_back_to_validation() {
        let idx = filter_indices(&rows(), &template(true, true), &ExecutionContext::single());
        // row 1 and row 3 fail both checks
        assert_eq!(idx, vec![0, 2]);
    }

    #[test]
    fn test_non_main_worker_filters_identically() {
        let main  = filter_indices(&rows(), &template(true, true), &ExecutionContext::new(0, 2).unwrap());
        let other = filter_indices(&rows(), &template(true, true), &ExecutionContext::new(1, 2).unwrap());
        assert_eq!(main, other);
    }

    #[test]
    fn test_rank_outside_world_rejected() {
        assert!(matches!(ExecutionContext::new(5, 2), Err(PipelineError::Config(_))));
        assert!(matches!(ExecutionContext::new(2, 2), Err(PipelineError::Config(_))));
        assert!(matches!(ExecutionContext::new(0, 0), Err(PipelineError::Config(_))));
        assert!(ExecutionContext::new(1, 2).is_ok());
    }

    #[test]
    fn test_shards_are_disjoint_and_cover_everything() {
        let indices: Vec<usize> = vec![0, 2, 3, 5, 8, 9, 11];
        for world in 1..=4 {
            let mut seen = Vec::new();
            for rank in 0..world {
                let shard = ExecutionContext::new(rank, world).unwrap().shard(&indices);
                assert!(shard.iter().all(|i| !seen.contains(i)));
                seen.extend(shard);
            }
            assert_eq!(seen, indices, "world size {world}");
        }
    }

    #[test]
    fn test_shard_sizes_differ_by_at_most_one() {
        let sizes: Vec<usize> = (0..3)
            .map(|rank| ExecutionContext::new(rank, 3).unwrap().shard_range(7).len())
            .collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        // more ranks than items: trailing ranks get nothing
        assert!(ExecutionContext::new(3, 4).unwrap().shard_range(2).is_empty());
    }

    #[test]
    fn test_empty_dataset() {
        let empty = InMemDataset::<RawRecord>::new(Vec::new());
        assert!(filter_indices(&empty, &template(true, true), &ExecutionContext::single()).is_empty());
    }
}
