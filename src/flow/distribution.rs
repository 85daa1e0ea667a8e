//! Cycle time histograms and percentiles

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count of cards per whole-day cycle time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    buckets: BTreeMap<i64, usize>,
    total: usize,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut histogram = Self::new();
        for value in values {
            histogram.add(value);
        }
        histogram
    }

    pub fn add(&mut self, days: i64) {
        *self.buckets.entry(days).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, days: i64) -> usize {
        self.buckets.get(&days).copied().unwrap_or(0)
    }

    /// Smallest value whose cumulative count reaches `target` (0.0..=1.0) of
    /// the population, with the cumulative fraction actually reached
    pub fn percentile(&self, target: f64) -> Option<Percentile> {
        if self.is_empty() {
            return None;
        }

        let needed = target * self.total as f64;
        let mut cumulative = 0usize;
        let mut last = None;

        for (days, count) in &self.buckets {
            cumulative += count;
            last = Some(*days);
            if cumulative as f64 >= needed {
                return Some(Percentile {
                    days: *days,
                    fraction: cumulative as f64 / self.total as f64,
                });
            }
        }

        last.map(|days| Percentile {
            days,
            fraction: 1.0,
        })
    }

    /// One row per distinct value in ascending order
    pub fn rows(&self) -> Vec<HistogramRow> {
        let mut cumulative = 0usize;
        self.buckets
            .iter()
            .map(|(days, count)| {
                cumulative += count;
                HistogramRow {
                    days: *days,
                    count: *count,
                    percent: *count as f64 / self.total as f64,
                    cumulative_percent: cumulative as f64 / self.total as f64,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Percentile {
    pub days: i64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramRow {
    pub days: i64,
    pub count: usize,
    pub percent: f64,
    pub cumulative_percent: f64,
}

/// Cycle time distribution of a population of done cards
#[derive(Debug, Clone, Default)]
pub struct CycleTimeDistribution {
    histogram: Histogram,
}

impl CycleTimeDistribution {
    pub fn new(cycle_times: &[i64]) -> Self {
        Self {
            histogram: Histogram::from_values(cycle_times.iter().copied()),
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn rows(&self) -> Vec<HistogramRow> {
        self.histogram.rows()
    }

    pub fn percentile(&self, target: f64) -> Option<Percentile> {
        self.histogram.percentile(target)
    }

    /// Days within which the given share of cards finished, e.g. 0.8 or 0.95
    pub fn days_for(&self, target: f64) -> Option<i64> {
        self.percentile(target).map(|p| p.days)
    }
}
