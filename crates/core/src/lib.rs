#![forbid(unsafe_code)]

pub mod aggregate;
pub mod completion;
pub mod model;
pub mod streak;
pub mod time;

pub use time::{CalendarDay, Clock};
