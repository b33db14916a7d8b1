//! Webhook gateway: HTTP ingress for alert requests.

mod dispatch;
pub mod routes;

pub use dispatch::{DispatchError, Dispatcher};
pub use routes::{AppState, build_router};
