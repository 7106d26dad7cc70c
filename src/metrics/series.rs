use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub label: String,
    pub value: f64,
}

/// Sliding window of labelled samples backing one chart.
///
/// Points are kept in arrival order. Once the window is full every append
/// evicts the single oldest point, so the label and value of a sample always
/// leave together.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    name: String,
    capacity: usize,
    points: VecDeque<TimeSeriesPoint>,
}

impl TimeSeriesBuffer {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            points: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn with_default_window(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_WINDOW)
    }

    pub fn append(&mut self, label: impl Into<String>, value: f64) {
        self.points.push_back(TimeSeriesPoint {
            label: label.into(),
            value,
        });
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<TimeSeriesPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
