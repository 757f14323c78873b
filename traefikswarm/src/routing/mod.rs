//! Translation between routing concepts and the arguments and labels of swarm services.
//!
//! Every write goes through the change-tracking operations of [`ServiceState`], so re-encoding an
//! unchanged value never marks a service as dirty.
//!
//! [`ServiceState`]: crate::service::ServiceState

mod basic_auth;
pub use basic_auth::*;

mod entrypoint;
pub use entrypoint::*;

mod router;
pub use router::*;

mod rule;
pub use rule::*;
