//! Domain model shared by every yodel crate: messages, users, endpoints,
//! capability profiles, copy headers and the narrow collaborator traits the
//! delivery pipeline consumes.

pub mod audit;
pub mod capability;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod ids;
pub mod identity;
pub mod logging;
pub mod payload_type;
pub mod traits;
pub mod user;
pub mod yo;

pub use tracing;

pub use self::{
    capability::CapabilityProfile,
    endpoint::{AppVersion, Endpoint, Platform},
    error::{ApiError, DirectoryError},
    header::Header,
    ids::{EndpointId, HeaderId, UserId, YoId},
    payload_type::PayloadType,
    user::{ContactPair, User},
    yo::{Location, ResponsePair, Yo, YoContent, YoStatus},
};

#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
