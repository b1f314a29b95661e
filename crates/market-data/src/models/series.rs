use chrono::{DateTime, Utc};

/// One daily bar. `close` is `None` when the upstream reports `null`.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyBar {
    pub timestamp: DateTime<Utc>,
    pub close: Option<f64>,
}

/// Daily bars in chronological order, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DailySeries {
    pub bars: Vec<DailyBar>,
}

impl DailySeries {
    pub fn new(bars: Vec<DailyBar>) -> Self {
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Timestamp of the most recent bar.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|bar| bar.timestamp)
    }

    pub fn close_at(&self, index: usize) -> Option<f64> {
        self.bars.get(index).and_then(|bar| bar.close)
    }
}
