//! Wall-clock helpers
//!
//! The status clock compares against local calendar time, the same frame the
//! config's date and time strings are written in.

use chrono::{Local, NaiveDateTime};

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}
