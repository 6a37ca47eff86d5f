//! Sequence slicing shared by the AST evaluator and the segment walker.
//!
//! Bounds follow the usual sequence-slice rules: negative positions count
//! from the end, a negative step walks backwards, and out-of-range bounds
//! clamp instead of failing.

use std::fmt;

/// Which part of a `start:end:step` slice a value was supplied for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceBound {
    Start,
    End,
    Step,
}

impl fmt::Display for SliceBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceBound::Start => write!(f, "start"),
            SliceBound::End => write!(f, "end"),
            SliceBound::Step => write!(f, "step"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SliceError {
    /// A bound evaluated to something other than an integer
    #[error("slice bound must be an integer: {bound} is {found}")]
    BoundNotInteger { bound: SliceBound, found: String },

    #[error("slice step must not be zero")]
    StepZero,
}

/// A validated `start:end:step` slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    /// Build a slice, rejecting a zero step.
    pub fn new(start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Result<Self, SliceError> {
        if step == Some(0) {
            return Err(SliceError::StepZero);
        }
        Ok(SliceSpec { start, end, step })
    }

    /// Positions selected from a sequence of length `len`, in traversal order.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let step = self.step.unwrap_or(1);
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

        let clamp = |bound: i64| {
            if bound < 0 {
                bound.saturating_add(len).max(lower)
            } else {
                bound.min(upper)
            }
        };

        let start = match self.start {
            Some(s) => clamp(s),
            None if step < 0 => upper,
            None => lower,
        };
        let end = match self.end {
            Some(e) => clamp(e),
            None if step < 0 => lower,
            None => upper,
        };

        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            if let Ok(idx) = usize::try_from(i) {
                out.push(idx);
            }
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        out
    }

    /// Apply the slice to a sequence, cloning the selected elements.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.indices(items.len())
            .into_iter()
            .filter_map(|i| items.get(i).cloned())
            .collect()
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}
