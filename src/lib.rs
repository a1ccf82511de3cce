//! # osf_explorer
//!
//! Rust client library for browsing Open Science Framework (OSF) storage.
//!
//! ## Features
//!
//! - **Authentication**: OAuth implicit-grant login against the OSF accounts
//!   server, with the token kept in a file between runs and revoked on logout.
//! - **Remote tree**: lazy model of projects, storage providers, folders and
//!   files that is populated on expand and dropped on collapse.
//! - **Reconciliation**: refreshed listings are diffed against what is shown,
//!   producing minimal insert/remove/update edits keyed by remote id.
//! - **File operations**: create folders, delete, upload and download with
//!   progress reporting.
//! - **Events**: every tree or login change is broadcast as a [`TreeEvent`].
//!
//! All state lives in one actor behind an [`ExplorerHandle`]. Identical
//! requests issued while one is in flight share its result.
//!
//! ## Example: Browse projects
//!
//! ```no_run
//! use osf_explorer::{Config, ExplorerHandle, ROOT_ID};
//!
//! # async fn example() -> osf_explorer::Result<()> {
//! let config = Config::from_env().with_token_file("osf_token.json");
//! let explorer = ExplorerHandle::connect(config)?;
//!
//! if explorer.restore_session().await?.is_none() {
//!     let url = explorer.begin_login().await?;
//!     println!("Open {url} and paste the URL you are redirected to");
//!     # let redirect = String::new();
//!     explorer.complete_login(&redirect).await?;
//! }
//!
//! for project in explorer.expand(ROOT_ID).await? {
//!     println!("{} ({})", project.name, project.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Follow changes
//!
//! ```no_run
//! use osf_explorer::{ExplorerHandle, TreeEvent};
//!
//! # async fn example(explorer: ExplorerHandle) -> osf_explorer::Result<()> {
//! let mut events = explorer.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         TreeEvent::Inserted { parent, index, record } => {
//!             println!("+ {parent}[{index}] {}", record.name)
//!         }
//!         TreeEvent::Removed { parent, id } => println!("- {parent}/{id}"),
//!         TreeEvent::LoggedOut => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod fs;
pub mod http;
pub mod progress;
pub mod session;

// Re-export commonly used types
pub use api::{OsfClient, RemoteApi, UserInfo};
pub use config::Config;
pub use error::{OsfError, Result};
pub use events::{EventBus, OperationKind, TreeEvent};
pub use fs::{NodeKind, NodeRecord, ROOT_ID, RemoteTree, TreeEdit};
pub use progress::{ProgressCallback, TransferDirection, TransferProgress};
pub use session::{AuthStatus, ExplorerHandle, Session, Token};
