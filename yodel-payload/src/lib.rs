//! Turns a Yo into what each channel actually sends.
//!
//! Rendering happens in two steps: [`PayloadBuilder::prepare`] gathers names
//! and headers from the collaborators once per Yo, then
//! [`PayloadBuilder::render`] produces [`ChannelBodies`] for one
//! [`CapabilityProfile`](yodel_common::CapabilityProfile). Partitions render
//! once per distinct profile rather than once per endpoint.

pub mod builder;
pub mod category;
pub mod classify;
pub mod config;
pub mod context;
pub mod copy;
pub mod envelope;
pub mod error;
pub mod sms;
pub mod social;
pub mod webhook;

pub use builder::{ChannelBodies, GroupVariant, PayloadBuilder, Prepared, RenderRequest};
pub use classify::classify;
pub use config::PayloadConfig;
pub use copy::CopyResolver;
pub use envelope::PushEnvelope;
pub use error::RenderError;
pub use webhook::WebhookParams;
