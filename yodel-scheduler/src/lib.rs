//! Time-based scheduling.
//!
//! A [`Scheduler`] holds one [`ScheduleHandler`] per job type. Each poll asks
//! every handler for the items due within its grace window and executes them;
//! between polls it sleeps until the next due item, capped by the poll
//! interval.

mod config;
mod error;
mod handler;
mod scheduled_yo;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use handler::{Execution, ScheduleHandler, ScheduledItem};
pub use scheduled_yo::{JOB_TYPE as SCHEDULED_YO, ScheduledYoHandler};
pub use scheduler::Scheduler;
