//! Fixed-capacity FIFO window of recent load samples.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One evicted or inspected slot of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: String,
    pub actual: f64,
    pub predicted: Option<f64>,
}

/// Labels, actual values and predictions kept in lockstep: all three
/// sequences always have the same length, never above `capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryWindow {
    capacity: usize,
    labels: VecDeque<String>,
    actual: VecDeque<f64>,
    predicted: VecDeque<Option<f64>>,
}

impl HistoryWindow {
    /// A zero capacity is bumped to 1 so the window can always hold the latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            labels: VecDeque::with_capacity(capacity + 1),
            actual: VecDeque::with_capacity(capacity + 1),
            predicted: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Builds a window pre-filled with unpredicted samples, oldest first.
    pub fn seeded<I>(capacity: usize, samples: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut window = Self::new(capacity);
        for (label, actual) in samples {
            window.push(label, actual, None);
        }
        window
    }

    /// Appends a sample and returns the evicted oldest one, if the window was full.
    pub fn push(&mut self, label: String, actual: f64, predicted: Option<f64>) -> Option<Sample> {
        self.labels.push_back(label);
        self.actual.push_back(actual);
        self.predicted.push_back(predicted);
        if self.actual.len() > self.capacity {
            let label = self.labels.pop_front()?;
            let actual = self.actual.pop_front()?;
            let predicted = self.predicted.pop_front()?;
            return Some(Sample {
                label,
                actual,
                predicted,
            });
        }
        None
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.actual.clear();
        self.predicted.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.actual.back().copied()
    }

    pub fn labels(&self) -> &VecDeque<String> {
        &self.labels
    }

    pub fn actual(&self) -> &VecDeque<f64> {
        &self.actual
    }

    pub fn predicted(&self) -> &VecDeque<Option<f64>> {
        &self.predicted
    }

    /// Actual values oldest-first, as a contiguous series for the forecaster.
    pub fn actual_series(&self) -> Vec<f64> {
        self.actual.iter().copied().collect()
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.labels
            .iter()
            .zip(&self.actual)
            .zip(&self.predicted)
            .map(|((label, actual), predicted)| Sample {
                label: label.clone(),
                actual: *actual,
                predicted: *predicted,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_of(window: &HistoryWindow) -> Vec<&str> {
        window.labels().iter().map(String::as_str).collect()
    }

    #[test]
    fn push_beyond_capacity_evicts_oldest() {
        let mut window = HistoryWindow::seeded(
            3,
            [
                ("t0".to_string(), 10.0),
                ("t1".to_string(), 20.0),
                ("t2".to_string(), 30.0),
            ],
        );

        let evicted = window.push("t3".to_string(), 40.0, None);

        assert_eq!(window.actual_series(), vec![20.0, 30.0, 40.0]);
        assert_eq!(labels_of(&window), vec!["t1", "t2", "t3"]);
        let evicted = evicted.expect("full window should evict");
        assert_eq!(evicted.label, "t0");
        assert!((evicted.actual - 10.0).abs() < 1e-9);
    }

    #[test]
    fn filling_does_not_evict() {
        let mut window = HistoryWindow::new(3);
        assert!(window.push("a".to_string(), 1.0, None).is_none());
        assert!(window.push("b".to_string(), 2.0, Some(2.5)).is_none());
        assert_eq!(window.len(), 2);
        assert_eq!(window.predicted().back(), Some(&Some(2.5)));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut window = HistoryWindow::new(5);
        for i in 0..100 {
            let evicted = window.push(format!("{i:02}:00"), f64::from(i), None);
            assert!(window.len() <= 5);
            assert_eq!(window.labels().len(), window.actual().len());
            assert_eq!(window.predicted().len(), window.actual().len());
            assert_eq!(evicted.is_some(), i >= 5, "exactly one eviction per push once full");
        }
        assert_eq!(window.actual_series(), vec![95.0, 96.0, 97.0, 98.0, 99.0]);
    }

    #[test]
    fn seeding_more_than_capacity_keeps_newest() {
        let window = HistoryWindow::seeded(2, (0..4).map(|i| (format!("t{i}"), f64::from(i))));
        assert_eq!(labels_of(&window), vec!["t2", "t3"]);
    }

    #[test]
    fn zero_capacity_still_holds_latest() {
        let mut window = HistoryWindow::new(0);
        window.push("x".to_string(), 7.0, None);
        window.push("y".to_string(), 8.0, None);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.latest(), Some(8.0));
    }

    #[test]
    fn clear_empties_all_series() {
        let mut window = HistoryWindow::seeded(3, [("a".to_string(), 1.0)]);
        window.clear();
        assert!(window.is_empty());
        assert!(window.labels().is_empty());
        assert!(window.predicted().is_empty());
        assert_eq!(window.latest(), None);
    }
}
