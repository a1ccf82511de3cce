//! Login state and the explorer actor.

pub mod actor;
pub mod auth;
mod pending;
mod session;

pub use actor::ExplorerHandle;
pub use auth::{AuthManager, AuthStatus};
pub use session::{Session, Token};
