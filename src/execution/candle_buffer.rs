use crate::models::Candle;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Fixed-capacity rolling window of high/low/close values
///
/// The three sequences always have the same length. Once full, each append
/// evicts the oldest entry of every sequence (FIFO). `append` is the only
/// way to insert data.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    closes: VecDeque<f64>,
    capacity: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Read-only view of the buffer contents, oldest first
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    pub highs: &'a [f64],
    pub lows: &'a [f64],
    pub closes: &'a [f64],
}

impl<'a> HistoryView<'a> {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Close of the candle before the latest one
    pub fn previous_close(&self) -> Option<f64> {
        self.closes.iter().rev().nth(1).copied()
    }
}

impl CandleBuffer {
    /// Create a new buffer holding at most `capacity` candles
    pub fn new(capacity: usize) -> Self {
        Self {
            highs: VecDeque::with_capacity(capacity + 1),
            lows: VecDeque::with_capacity(capacity + 1),
            closes: VecDeque::with_capacity(capacity + 1),
            capacity,
            last_timestamp: None,
        }
    }

    /// Append a candle's high/low/close
    ///
    /// If the buffer is full, removes the oldest values
    pub fn append(&mut self, candle: &Candle) {
        self.highs.push_back(candle.high);
        self.lows.push_back(candle.low);
        self.closes.push_back(candle.close);

        while self.closes.len() > self.capacity {
            self.highs.pop_front();
            self.lows.pop_front();
            self.closes.pop_front();
        }

        // Keep each deque in a single slice so views can borrow it directly
        self.highs.make_contiguous();
        self.lows.make_contiguous();
        self.closes.make_contiguous();

        self.last_timestamp = Some(candle.timestamp);
    }

    /// Borrow the current contents for indicator computation
    pub fn view(&self) -> HistoryView<'_> {
        HistoryView {
            highs: self.highs.as_slices().0,
            lows: self.lows.as_slices().0,
            closes: self.closes.as_slices().0,
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.back().copied()
    }

    /// Timestamp of the most recently appended candle
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }
}
