// ============================================================
// Layer 5 — Output Matcher
// ============================================================
// Pairs benchmark items with generated outputs by question_id.
//
//   - an item matches the FIRST output carrying its id
//   - each id is consumed at most once per pass, so a second
//     item (or a second output) with the same id is ignored
//   - items with no output are dropped, not reported
//
// The outputs are indexed once up front, which gives the same
// pairs as scanning every output for every item, in O(N + M).
//
// One OutputMatcher = one pass over one task. Never reuse a
// matcher across tasks: ids repeat between tasks.

use std::collections::{HashMap, HashSet};

use crate::domain::inference::InferenceOutput;
use crate::domain::record::{QuestionId, RawRecord};

pub struct OutputMatcher<'a> {
    first_by_id: HashMap<&'a QuestionId, &'a InferenceOutput>,
    seen:        HashSet<QuestionId>,
}

impl<'a> OutputMatcher<'a> {
    pub fn new(outputs: &'a [InferenceOutput]) -> Self {
        let mut first_by_id = HashMap::with_capacity(outputs.len());
        for output in outputs {
            first_by_id.entry(&output.question_id).or_insert(output);
        }
        Self { first_by_id, seen: HashSet::new() }
    }

    /// The output for `id`, unless `id` was already consumed.
    pub fn claim(&mut self, id: &QuestionId) -> Option<&'a InferenceOutput> {
        let output = *self.first_by_id.get(id)?;
        if !self.seen.insert(id.clone()) {
            return None;
        }
        Some(output)
    }

    /// Number of distinct ids consumed so far.
    pub fn claimed(&self) -> usize {
        self.seen.len()
    }
}

/// Lazily pair every matchable item with its output.
/// An item without a readable question_id cannot match.
pub fn match_outputs<'a, I>(
    items:   I,
    outputs: &'a [InferenceOutput],
) -> impl Iterator<Item = (&'a RawRecord, &'a InferenceOutput)>
where
    I: IntoIterator<Item = &'a RawRecord>,
    I::IntoIter: 'a,
{
    let mut matcher = OutputMatcher::new(outputs);
    items.into_iter().filter_map(move |item| {
        let id = item.question_id().ok()?;
        matcher.claim(&id).map(|output| (item, output))
    })
}
