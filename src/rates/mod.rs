//! Rate tables and their shared, swappable handle.

pub mod handle;
pub mod schedule;

pub use handle::{ScheduleHandle, ScheduleSwap};
pub use schedule::{NotaryBracket, RateSchedule, RateScheduleConfig};
