//! OSF API client and response types.

pub mod client;
pub mod error;
pub mod types;

pub use client::{OsfClient, RemoteApi};
pub use error::error_message;
pub use types::UserInfo;
