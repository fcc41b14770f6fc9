// ============================================================
// Layer 5 — Score Aggregation
// ============================================================
// Two kinds of task:
//
//   Binary (POPE)        — one confusion-matrix cell per item
//                          precision = TP / (TP + FP)
//                          recall    = TP / (TP + FN)
//                          f1        = 2PR / (P + R)
//                          accuracy  = (TP + TN) / total
//                          yes_ratio = predicted Yes / total
//
//   Direct match (A-OKVQA) — matches / total
//
// Any zero denominator yields 0.0. Counters only ever go up;
// metrics are computed from them on demand and are fractions
// in [0, 1].
//
// BenchmarkAggregator averages per-task metrics over the tasks
// that were actually scored.

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, Result};
use crate::eval::judge::YesNo;

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

// ─── Binary ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn record(&mut self, prediction: YesNo, label: YesNo) {
        match (prediction.is_positive(), label.is_positive()) {
            (true,  true)  => self.tp  += 1,
            (true,  false) => self.fp  += 1,
            (false, false) => self.tn  += 1,
            (false, true)  => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn predicted_positive(&self) -> usize {
        self.tp + self.fp
    }

    pub fn metrics(&self) -> BinaryMetrics {
        let precision = ratio(self.tp, self.tp + self.fp);
        let recall    = ratio(self.tp, self.tp + self.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        BinaryMetrics {
            accuracy:  ratio(self.tp + self.tn, self.total()),
            precision,
            recall,
            f1,
            yes_ratio: ratio(self.predicted_positive(), self.total()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub yes_ratio: f64,
}

impl BinaryMetrics {
    fn add(self, other: Self) -> Self {
        Self {
            accuracy:  self.accuracy  + other.accuracy,
            precision: self.precision + other.precision,
            recall:    self.recall    + other.recall,
            f1:        self.f1        + other.f1,
            yes_ratio: self.yes_ratio + other.yes_ratio,
        }
    }

    fn scale(self, by: f64) -> Self {
        Self {
            accuracy:  self.accuracy  * by,
            precision: self.precision * by,
            recall:    self.recall    * by,
            f1:        self.f1        * by,
            yes_ratio: self.yes_ratio * by,
        }
    }
}

// ─── Direct match ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub matches: usize,
    pub total:   usize,
}

impl MatchCounts {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.matches += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.matches, self.total)
    }
}

// ─── Per-task result ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskScore {
    Binary(ConfusionCounts),
    Match(MatchCounts),
}

impl TaskScore {
    pub fn total(&self) -> usize {
        match self {
            Self::Binary(c) => c.total(),
            Self::Match(c)  => c.total,
        }
    }

    pub fn accuracy(&self) -> f64 {
        match self {
            Self::Binary(c) => c.metrics().accuracy,
            Self::Match(c)  => c.accuracy(),
        }
    }
}

/// Mean of per-task metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub tasks_scored:  usize,
    pub total_scored:  usize,
    pub accuracy:      f64,
    /// Present when every scored task was binary
    pub binary:        Option<BinaryMetrics>,
}

// ─── BenchmarkAggregator ──────────────────────────────────────────────────────
/// Collects one TaskScore per task for a single run.
#[derive(Debug, Clone)]
pub struct BenchmarkAggregator {
    declared_tasks: usize,
    tasks:          Vec<(String, TaskScore)>,
}

impl BenchmarkAggregator {
    /// `declared_tasks` is the number of tasks the benchmark defines.
    pub fn new(declared_tasks: usize) -> Result<Self> {
        if declared_tasks == 0 {
            return Err(PipelineError::config("a benchmark must declare at least one task"));
        }
        Ok(Self { declared_tasks, tasks: Vec::new() })
    }

    pub fn add(&mut self, task: impl Into<String>, score: TaskScore) {
        self.tasks.push((task.into(), score));
    }

    pub fn tasks(&self) -> &[(String, TaskScore)] {
        &self.tasks
    }

    pub fn declared_tasks(&self) -> usize {
        self.declared_tasks
    }

    /// Average over the tasks actually scored. A run that scored a
    /// different number of tasks than declared is logged, since
    /// its overall figure is not comparable with a full run.
    pub fn overall(&self) -> OverallScore {
        let n = self.tasks.len();
        if n != self.declared_tasks {
            tracing::warn!(
                "Scored {} task(s) but the benchmark declares {}; averaging over {}",
                n, self.declared_tasks, n,
            );
        }
        if n == 0 {
            return OverallScore::default();
        }

        let scale = 1.0 / n as f64;
        let accuracy = self.tasks.iter().map(|(_, s)| s.accuracy()).sum::<f64>() * scale;
        let total_scored = self.tasks.iter().map(|(_, s)| s.total()).sum();

        let binary = self.tasks
            .iter()
            .map(|(_, s)| match s {
                TaskScore::Binary(c) => Some(c.metrics()),
                TaskScore::Match(_)  => None,
            })
            .try_fold(BinaryMetrics::default(), |acc, m| m.map(|m| acc.add(m)))
            .map(|sum| sum.scale(scale));

        OverallScore { tasks_scored: n, total_scored, accuracy, binary }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use YesNo::{No, Yes};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_each_pair_hits_one_cell() {
        let mut c = ConfusionCounts::default();
        c.record(Yes, Yes);
        c.record(Yes, No);
        c.record(No, No);
        c.record(No, Yes);
        c.record(No, Yes);

        assert_eq!(c, ConfusionCounts { tp: 1, fp: 1, tn: 1, fn_: 2 });
        assert_eq!(c.total(), 5);
    }

    #[test]
    fn test_binary_metrics() {
        let c = ConfusionCounts { tp: 3, fp: 1, tn: 4, fn_: 2 };
        let m = c.metrics();

        assert!(approx(m.precision, 0.75));
        assert!(approx(m.recall, 0.6));
        assert!(approx(m.f1, 2.0 * 0.75 * 0.6 / 1.35));
        assert!(approx(m.accuracy, 0.7));
        assert!(approx(m.yes_ratio, 0.4));
    }

    #[test]
    fn test_zero_denominators_give_zero() {
        let c = ConfusionCounts { tp: 0, fp: 0, tn: 5, fn_: 0 };
        let m = c.metrics();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 1.0);

        let empty = ConfusionCounts::default().metrics();
        assert_eq!(empty, BinaryMetrics::default());
    }

    #[test]
    fn test_metrics_stay_in_unit_interval() {
        for tp in 0..4 {
            for fp in 0..4 {
                for tn in 0..4 {
                    for fn_ in 0..4 {
                        let m = ConfusionCounts { tp, fp, tn, fn_ }.metrics();
                        for v in [m.accuracy, m.precision, m.recall, m.f1, m.yes_ratio] {
                            assert!((0.0..=1.0).contains(&v));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_match_counts() {
        let mut c = MatchCounts::default();
        assert_eq!(c.accuracy(), 0.0);
        c.record(true);
        c.record(false);
        c.record(true);
        c.record(true);
        assert!(approx(c.accuracy(), 0.75));
    }

    #[test]
    fn test_zero_declared_tasks_rejected() {
        assert!(BenchmarkAggregator::new(0).is_err());
    }

    #[test]
    fn test_overall_divides_by_tasks_scored() {
        let mut agg = BenchmarkAggregator::new(3).unwrap();
        agg.add("random",  TaskScore::Binary(ConfusionCounts { tp: 1, tn: 1, fp: 0, fn_: 0 }));
        agg.add("popular", TaskScore::Binary(ConfusionCounts { tp: 0, tn: 0, fp: 1, fn_: 1 }));

        let overall = agg.overall();
        assert_eq!(overall.tasks_scored, 2);
        assert_eq!(overall.total_scored, 4);
        assert!(approx(overall.accuracy, 0.5));
        assert!(approx(overall.binary.unwrap().precision, 0.5));
    }

    #[test]
    fn test_overall_of_match_tasks_has_no_binary_metrics() {
        let mut agg = BenchmarkAggregator::new(1).unwrap();
        agg.add("val", TaskScore::Match(MatchCounts { matches: 1, total: 2 }));
        let overall = agg.overall();
        assert!(overall.binary.is_none());
        assert!(approx(overall.accuracy, 0.5));
    }

    #[test]
    fn test_empty_aggregator() {
        let agg = BenchmarkAggregator::new(2).unwrap();
        assert_eq!(agg.overall(), OverallScore::default());
    }
}
