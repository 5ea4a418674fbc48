//! Time-indexed tables of named output series.

use crate::errors::{DmmError, DmmResult};
use crate::timeseries::{FloatValue, Time, TimeGrid};
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Model output: one row per sampled time and one column per named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFrame {
    time: Array1<Time>,
    columns: Vec<String>,
    values: Array2<FloatValue>,
}

impl OutputFrame {
    /// Create a new frame
    ///
    /// `values` must have one row per time point and one column per name.
    pub fn new(
        time: Array1<Time>,
        columns: Vec<String>,
        values: Array2<FloatValue>,
    ) -> DmmResult<Self> {
        if values.nrows() != time.len() || values.ncols() != columns.len() {
            return Err(DmmError::Integration(format!(
                "output shape {:?} does not match {} times and {} columns",
                values.shape(),
                time.len(),
                columns.len()
            )));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(DmmError::Integration(format!(
                    "duplicate output column '{}'",
                    name
                )));
            }
        }
        Ok(Self {
            time,
            columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &Array1<Time> {
        &self.time
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    pub fn last_time(&self) -> Option<Time> {
        self.time.iter().next_back().copied()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, FloatValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(idx))
    }

    /// Get a named series, failing if the frame has no such column.
    pub fn series(&self, name: &str) -> DmmResult<ArrayView1<'_, FloatValue>> {
        self.column(name)
            .ok_or_else(|| DmmError::MissingOutput(name.to_string()))
    }

    /// Keep only rows whose time is a point of `grid`.
    pub fn restrict_to(&self, grid: &TimeGrid) -> Self {
        let rows: Vec<usize> = self
            .time
            .iter()
            .enumerate()
            .filter(|(_, t)| grid.contains(**t))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&rows)
    }

    /// Keep only rows strictly after `t`.
    pub fn after(&self, t: Time) -> Self {
        let rows: Vec<usize> = self
            .time
            .iter()
            .enumerate()
            .filter(|(_, time)| **time > t)
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&rows)
    }

    /// The last `n` rows (or the whole frame if it is shorter).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            time: self.time.slice(s![start..]).to_owned(),
            columns: self.columns.clone(),
            values: self.values.slice(s![start.., ..]).to_owned(),
        }
    }

    /// Append the rows of `other` to the end of this frame.
    ///
    /// Both frames must have the same columns and `other` must start after this frame ends.
    pub fn append(&mut self, other: OutputFrame) -> DmmResult<()> {
        if other.columns != self.columns {
            return Err(DmmError::Integration(
                "cannot append output frames with different columns".to_string(),
            ));
        }
        if let (Some(end), Some(start)) = (self.last_time(), other.time.get(0)) {
            if *start <= end {
                return Err(DmmError::Integration(format!(
                    "appended output starts at t={} but existing output ends at t={}",
                    start, end
                )));
            }
        }
        let shape_error = |e: ndarray::ShapeError| DmmError::Integration(e.to_string());
        self.time = concatenate(Axis(0), &[self.time.view(), other.time.view()])
            .map_err(shape_error)?;
        self.values = concatenate(Axis(0), &[self.values.view(), other.values.view()])
            .map_err(shape_error)?;
        Ok(())
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            time: self.time.select(Axis(0), rows),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}
