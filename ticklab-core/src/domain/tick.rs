//! Tick records and the annotated tick frame.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ConsistencyError;

/// One quote/trade observation of the instrument at an intraday second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub dt: Option<NaiveDateTime>,
    pub date: NaiveDate,
    /// Seconds since midnight.
    pub second: u32,
    /// Last trade price and size.
    pub price: f64,
    pub qty: f64,
    /// Cumulative traded volume.
    pub volume: f64,
    pub open_interest: f64,
    /// Best bid price and size.
    pub b1: f64,
    pub b1_size: f64,
    /// Best offer price and size.
    pub s1: f64,
    pub s1_size: f64,
    pub mid: f64,
}

/// Contiguous rows belonging to one trading date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlice {
    pub date: NaiveDate,
    pub rows: Range<usize>,
}

/// Tick records plus named feature and response columns, ordered by
/// `(date, second)`.
///
/// Missing feature values are stored as NaN. The frame is immutable once
/// built; snapshots are borrowed through [`FrameView`].
#[derive(Debug, Clone)]
pub struct TickFrame {
    ticks: Vec<Tick>,
    columns: BTreeMap<String, Vec<f64>>,
    days: Vec<DaySlice>,
}

impl TickFrame {
    /// Build a frame, checking column lengths and `(date, second)` ordering.
    pub fn new(
        ticks: Vec<Tick>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, ConsistencyError> {
        for (name, values) in &columns {
            if values.len() != ticks.len() {
                return Err(ConsistencyError::ColumnLength {
                    column: name.clone(),
                    expected: ticks.len(),
                    actual: values.len(),
                });
            }
        }
        let days = index_days(&ticks)?;
        Ok(Self {
            ticks,
            columns,
            days,
        })
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Trading days in ascending order.
    pub fn days(&self) -> &[DaySlice] {
        &self.days
    }

    /// Distinct trading dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.days.iter().map(|d| d.date).collect()
    }

    /// View over all rows.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            frame: self,
            rows: 0..self.ticks.len(),
        }
    }

    /// View over the days with index in `days` (half-open).
    pub fn days_view(&self, days: Range<usize>) -> FrameView<'_> {
        let rows = if days.start >= days.end || days.start >= self.days.len() {
            0..0
        } else {
            let last = days.end.min(self.days.len()) - 1;
            self.days[days.start].rows.start..self.days[last].rows.end
        };
        FrameView { frame: self, rows }
    }
}

/// A read-only contiguous window of a [`TickFrame`].
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    frame: &'a TickFrame,
    rows: Range<usize>,
}

impl<'a> FrameView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row range in the underlying frame.
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn ticks(&self) -> &'a [Tick] {
        &self.frame.ticks[self.rows.clone()]
    }

    pub fn column(&self, name: &str) -> Option<&'a [f64]> {
        self.frame
            .columns
            .get(name)
            .map(|v| &v[self.rows.clone()])
    }

    /// Distinct dates covered by this view.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.ticks().iter().map(|t| t.date).collect();
        dates.dedup();
        dates
    }
}

fn index_days(ticks: &[Tick]) -> Result<Vec<DaySlice>, ConsistencyError> {
    let mut days: Vec<DaySlice> = Vec::new();
    for (i, tick) in ticks.iter().enumerate() {
        match days.last_mut() {
            Some(day) if day.date == tick.date => {
                let previous = ticks[i - 1].second;
                if tick.second < previous {
                    return Err(ConsistencyError::SecondsOutOfOrder {
                        row: i,
                        date: tick.date,
                        previous,
                        current: tick.second,
                    });
                }
                day.rows.end = i + 1;
            }
            Some(day) if tick.date < day.date => {
                return Err(ConsistencyError::DatesOutOfOrder {
                    row: i,
                    previous: day.date,
                    current: tick.date,
                });
            }
            _ => days.push(DaySlice {
                date: tick.date,
                rows: i..i + 1,
            }),
        }
    }
    Ok(days)
}
