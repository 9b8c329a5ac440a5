//! # Gantry Server
//!
//! Route groups, the dispatcher and the hyper-based server for Gantry.
//!
//! - [`Group`] - Nestable, prefixed routes with inherited middleware
//! - [`Dispatcher`] - Resolves a request and runs its chain
//! - [`Server`] - Listeners, connection handling and graceful shutdown
//! - [`StaticDir`] - Static directory handler with an optional read limit
//! - [`h2_client`] - HTTP/2 prior-knowledge client
//!
//! ## Example
//!
//! ```rust,no_run
//! use gantry_core::{boxed, handler, Context};
//! use gantry_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default());
//!
//!     let api = server.root().sub_group(
//!         "/api",
//!         "api",
//!         vec![boxed(|ctx: &mut Context<'_>| ctx.set("api", true))],
//!     )?;
//!     api.get(
//!         "/users/{id}",
//!         handler::json(|ctx: &mut Context<'_>| {
//!             Ok(serde_json::json!({ "id": ctx.param("id") }))
//!         }),
//!     )?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/gantry-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
pub mod config;
mod dispatch;
mod error;
mod group;
mod semaphore;
mod server;
pub mod shutdown;
mod static_files;
mod stream;

pub use client::{h2_client, H2Client};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use dispatch::{DispatchReport, Dispatcher, Resolution};
pub use error::ServerError;
pub use group::Group;
pub use semaphore::{Permit, Semaphore};
pub use server::{ResponseBody, RunningServer, Server};
pub use shutdown::ShutdownSignal;
pub use static_files::StaticDir;
