//! Delivery of Yos: a bounded job queue with named lanes, the transports a
//! Yo leaves through, the per-recipient dispatcher, broadcast fan-out and
//! the send path callers go through.

mod config;
mod dispatcher;
mod error;
mod guard;
pub mod queue;
mod retry;
mod sender;
pub mod transport;

pub use config::{DeliveryConfig, FanoutConfig, SmsGuardConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher, PushOutcome, Transports};
pub use error::{DeliveryError, PermanentError, SystemError, TemporaryError};
pub use guard::SmsGuard;
pub use queue::{Job, JobHandler, JobQueue, Lane, LaneConfig, QueueConfig};
pub use retry::RetryPolicy;
pub use sender::YoSender;
