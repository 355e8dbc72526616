//! Time series storage
//!
//! A [`Series`] holds the parallel sequences of one channel. The same type is
//! used for the retained series and for the per-tick staging buffer.
//!
//! Invariant: every parallel sequence of a series has the same length. Points
//! are appended at the tail and removed from the head (window eviction) or
//! all at once (clear).

use serde::Serialize;
use std::collections::VecDeque;

use crate::protocol::shape::ShapeState;
use crate::protocol::variable::PointBatch;
use crate::types::{CurrentValue, TelemetryKind};

/// Parallel sequences of one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Series {
    Number {
        times: VecDeque<f64>,
        values: VecDeque<f64>,
    },
    Text {
        times: VecDeque<f64>,
        values: VecDeque<String>,
    },
    Xy {
        xs: VecDeque<f64>,
        ys: VecDeque<f64>,
        /// Auxiliary time axis, only used for eviction
        times: VecDeque<f64>,
    },
    #[serde(rename = "3D")]
    Shape {
        times: VecDeque<f64>,
        shapes: VecDeque<ShapeState>,
    },
}

impl Series {
    /// Create an empty series of the given kind
    pub fn new(kind: TelemetryKind) -> Self {
        match kind {
            TelemetryKind::Number => Series::Number {
                times: VecDeque::new(),
                values: VecDeque::new(),
            },
            TelemetryKind::Text => Series::Text {
                times: VecDeque::new(),
                values: VecDeque::new(),
            },
            TelemetryKind::Xy => Series::Xy {
                xs: VecDeque::new(),
                ys: VecDeque::new(),
                times: VecDeque::new(),
            },
            TelemetryKind::Shape3d => Series::Shape {
                times: VecDeque::new(),
                shapes: VecDeque::new(),
            },
        }
    }

    pub fn kind(&self) -> TelemetryKind {
        match self {
            Series::Number { .. } => TelemetryKind::Number,
            Series::Text { .. } => TelemetryKind::Text,
            Series::Xy { .. } => TelemetryKind::Xy,
            Series::Shape { .. } => TelemetryKind::Shape3d,
        }
    }

    /// The sequence used for window eviction
    pub fn time_axis(&self) -> &VecDeque<f64> {
        match self {
            Series::Number { times, .. }
            | Series::Text { times, .. }
            | Series::Xy { times, .. }
            | Series::Shape { times, .. } => times,
        }
    }

    pub fn len(&self) -> usize {
        self.time_axis().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First and last timestamp
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let times = self.time_axis();
        Some((*times.front()?, *times.back()?))
    }

    /// Append a decoded batch at the tail.
    ///
    /// Returns the number of points added, or `None` (and leaves the series
    /// untouched) when the batch is of another kind.
    pub fn append_batch(&mut self, batch: PointBatch) -> Option<usize> {
        let added = batch.len();
        match (self, batch) {
            (Series::Number { times, values }, PointBatch::Number { times: t, values: v }) => {
                times.extend(t);
                values.extend(v);
            }
            (Series::Text { times, values }, PointBatch::Text { times: t, values: v }) => {
                times.extend(t);
                values.extend(v);
            }
            (Series::Xy { xs, ys, times }, PointBatch::Xy { xs: x, ys: y, times: t }) => {
                xs.extend(x);
                ys.extend(y);
                times.extend(t);
            }
            (Series::Shape { times, shapes }, PointBatch::Shape { times: t, shapes: s }) => {
                times.extend(t);
                shapes.extend(s);
            }
            _ => return None,
        }
        Some(added)
    }

    /// Copy every point of `other` to the tail of `self`.
    ///
    /// Returns the number of points copied; nothing is copied across kinds.
    pub fn extend_from(&mut self, other: &Series) -> usize {
        match (self, other) {
            (Series::Number { times, values }, Series::Number { times: t, values: v }) => {
                times.extend(t.iter().copied());
                values.extend(v.iter().copied());
            }
            (Series::Text { times, values }, Series::Text { times: t, values: v }) => {
                times.extend(t.iter().copied());
                values.extend(v.iter().cloned());
            }
            (Series::Xy { xs, ys, times }, Series::Xy { xs: x, ys: y, times: t }) => {
                xs.extend(x.iter().copied());
                ys.extend(y.iter().copied());
                times.extend(t.iter().copied());
            }
            (Series::Shape { times, shapes }, Series::Shape { times: t, shapes: s }) => {
                times.extend(t.iter().copied());
                shapes.extend(s.iter().cloned());
            }
            _ => return 0,
        }
        other.len()
    }

    /// Remove every point
    pub fn clear(&mut self) {
        match self {
            Series::Number { times, values } => {
                times.clear();
                values.clear();
            }
            Series::Text { times, values } => {
                times.clear();
                values.clear();
            }
            Series::Xy { xs, ys, times } => {
                xs.clear();
                ys.clear();
                times.clear();
            }
            Series::Shape { times, shapes } => {
                times.clear();
                shapes.clear();
            }
        }
    }

    /// Drop the first `count` points of every parallel sequence
    fn drop_head(&mut self, count: usize) {
        match self {
            Series::Number { times, values } => {
                times.drain(..count);
                values.drain(..count);
            }
            Series::Text { times, values } => {
                times.drain(..count);
                values.drain(..count);
            }
            Series::Xy { xs, ys, times } => {
                xs.drain(..count);
                ys.drain(..count);
                times.drain(..count);
            }
            Series::Shape { times, shapes } => {
                times.drain(..count);
                shapes.drain(..count);
            }
        }
    }

    /// Apply the sliding window: drop every point older than `latest - window`.
    ///
    /// Returns the number of points removed.
    pub fn evict_before_window(&mut self, window: f64) -> usize {
        let Some(&latest) = self.time_axis().back() else {
            return 0;
        };
        let cut = window_cut_index(self.time_axis(), latest - window);
        if cut > 0 {
            self.drop_head(cut);
        }
        cut
    }

    /// Value of the newest point
    pub fn last_value(&self) -> Option<CurrentValue> {
        match self {
            Series::Number { values, .. } => values.back().map(|v| CurrentValue::Number(*v)),
            Series::Text { values, .. } => values.back().cloned().map(CurrentValue::Text),
            Series::Xy { xs, ys, .. } => match (xs.back(), ys.back()) {
                (Some(x), Some(y)) => Some(CurrentValue::Xy { x: *x, y: *y }),
                _ => None,
            },
            Series::Shape { shapes, .. } => shapes.back().cloned().map(CurrentValue::Shape),
        }
    }

    /// Newest shape snapshot of a 3D series
    pub fn last_shape(&self) -> Option<&ShapeState> {
        match self {
            Series::Shape { shapes, .. } => shapes.back(),
            _ => None,
        }
    }
}

/// Binary search for the head boundary of an ascending time axis: the index of
/// the first timestamp not older than `oldest`. Everything before it is out of
/// the window.
pub fn window_cut_index(times: &VecDeque<f64>, oldest: f64) -> usize {
    times.partition_point(|t| *t < oldest)
}
