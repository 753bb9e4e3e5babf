//! Acting identity for work done on someone's behalf.
//!
//! Scheduled Yos are executed by the scheduler, not by a request from their
//! sender; downstream permission checks and attribution read the acting user
//! from here instead of from an authenticated session.

use std::future::Future;

use crate::ids::UserId;

tokio::task_local! {
    static ACTING_USER: UserId;
}

/// Run `future` with `user` as the acting identity
pub async fn act_as<F: Future>(user: UserId, future: F) -> F::Output {
    ACTING_USER.scope(user, future).await
}

/// The identity the current task acts as, if any
pub fn acting_user() -> Option<UserId> {
    ACTING_USER.try_with(|user| *user).ok()
}
