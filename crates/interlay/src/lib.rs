//! Interception shim for an OpenCL-style compute runtime.
//!
//! Built as a `cdylib`, interlay substitutes for the real implementation's
//! shared library: every exported entry point forwards to the real
//! implementation unchanged while layering call logging, host timing,
//! error checking, object-lifecycle leak accounting and command-buffer
//! dependency tracing around the call stream. The application observes
//! exactly the results the real implementation produced.
//!
//! Embedders (and tests) can instead construct an [`Interlay`] instance
//! over any [`SymbolSource`] and activate it with [`install`]; dropping
//! the returned guard tears interception down and writes the teardown
//! report.

pub mod api;
pub mod cmdbuf;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod instance;
pub mod loader;
pub mod objects;
pub mod report;
pub mod timing;

pub(crate) mod pipeline;

pub use api::Handle;
pub use cmdbuf::{DependencyTracer, EdgeKind, NodeId};
pub use config::Config;
pub use instance::{install, shutdown, Guard, Interlay};
pub use loader::{RealLibrary, SymbolSource};
pub use objects::{LeakClass, ObjectKind, ObjectTracker, TypeCounts};
pub use report::{format_duration, JsonReporter, Reporter, Snapshot, TableReporter};
pub use timing::{FnTiming, HostTiming};
