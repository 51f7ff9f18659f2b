// src/clock.rs

use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};

/// Source of "today" for seniority, retirement and period defaults. The
/// calculator only reads the calendar through this seam, so runs can be
/// pinned to a date (`--as-of`) and tests are deterministic.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A pinned clock for reproducible runs and tests.
#[derive(Clone)]
pub struct FixedClock {
    current: Arc<Mutex<NaiveDate>>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            current: Arc::new(Mutex::new(date)),
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.current.lock().unwrap()
    }
}
