//! Post-processing applied by a `ThreadedProxy` worker to each raw reading.
use std::collections::VecDeque;

/// A stage run on every raw device reading before it is published.
///
/// One stage instance is shared by every worker generation of a proxy, so any
/// history it keeps survives idle teardown.
pub trait Refine<T>: Send {
    fn refine(&mut self, raw: T) -> T;
}

impl<T, F> Refine<T> for F
where
    F: FnMut(T) -> T + Send,
{
    fn refine(&mut self, raw: T) -> T {
        self(raw)
    }
}

/// Median over the last `window` readings.
///
/// For an even number of samples the upper median is reported, so the output
/// is always a value the device actually produced.
#[derive(Debug, Clone)]
pub struct MedianWindow<T> {
    window: usize,
    samples: VecDeque<T>,
    scratch: Vec<T>,
}

impl<T> MedianWindow<T> {
    /// `window` is clamped to at least one sample.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            scratch: Vec::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl<T: Copy + PartialOrd> MedianWindow<T> {
    /// Push one sample and return the median of the current window.
    ///
    /// Unordered samples (NaN) are not kept; they are returned as-is when the
    /// window is still empty, otherwise the current median is repeated.
    pub fn push(&mut self, value: T) -> T {
        if value.partial_cmp(&value).is_some() {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(value);
        }
        self.median().unwrap_or(value)
    }

    fn median(&mut self) -> Option<T> {
        self.scratch.clear();
        self.scratch.extend(self.samples.iter().copied());
        // Every kept sample is self-comparable, so this ordering is total.
        self.scratch
            .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.scratch.get(self.scratch.len() / 2).copied()
    }
}

impl<T: Copy + PartialOrd + Send> Refine<T> for MedianWindow<T> {
    fn refine(&mut self, raw: T) -> T {
        self.push(raw)
    }
}
