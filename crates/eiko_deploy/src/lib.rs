//! # eiko-deploy
//!
//! Executes a compiled task graph: per-resource handlers driven through a
//! CRUD state machine on a single-threaded cooperative scheduler with
//! bounded concurrency, one-shot promise resolution, dry-run support, and
//! graceful cancellation.
//!
//! ```no_run
//! use eiko_compile::compile_source;
//! use eiko_deploy::{Deployer, DeployOptions, HandlerRegistry};
//! use std::path::Path;
//!
//! # async fn demo() {
//! let (_, output) = compile_source("resource Host:\n    name: str\n\nHost(\"a\")\n",
//!     Path::new(".")).unwrap();
//! let handlers = HandlerRegistry::new();
//! let deployer = Deployer::new(&output.graph, &handlers, DeployOptions::default());
//! let report = deployer.run().await;
//! assert!(report.success());
//! # }
//! ```

pub mod deployer;
pub mod handler;
pub mod promise;

pub use deployer::{
    CancelToken, DeployOptions, DeployReport, Deployer, TaskReport, TaskState,
};
pub use handler::{CrudHandler, Handler, HandlerCtx, HandlerRegistry, PropertyError, RegisteredHandler};
pub use promise::{PromiseSlot, PromiseStore, SealReason};
