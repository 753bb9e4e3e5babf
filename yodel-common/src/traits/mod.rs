//! Narrow interfaces to everything the delivery pipeline consumes but does
//! not own.

pub mod copy;
pub mod directory;
pub mod services;

pub use self::{
    copy::{AbTesting, HeaderSource},
    directory::Directory,
    services::{Permissions, RealtimeNotifier, Shortener},
};
