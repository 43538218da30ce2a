//! # asm_client - Client Runtime Bootstrap
//!
//! Browser-side counterpart of `asm_render`. The runtime scans the hydration
//! markers of a server-rendered page, then activates each island according to
//! its directive as the host reports page events:
//!
//! | Directive   | Activates on                                             |
//! |-------------|----------------------------------------------------------|
//! | `immediate` | [`ClientRuntime::dom_parsed`]                            |
//! | `idle`      | [`ClientRuntime::idle`], or the fallback window elapsing |
//! | `visible`   | the first [`ClientRuntime::intersect`] for the island    |
//! | `media`     | the query matching, at parse time or on a change event   |
//!
//! Activation loads the island's module through a [`ModuleLoader`], builds
//! one instance and mounts it with the deserialized props. Removing the
//! subtree destroys the instance exactly once and releases every
//! subscription it took on the page bus.
//!
//! Failures never take the page down: the island stays static and a
//! [`HydrationMismatch`] is recorded.

pub mod config;
pub mod error;
pub mod module;
pub mod runtime;
pub mod scanner;

pub use config::ClientConfig;
pub use error::{BoxError, HydrationMismatch};
pub use module::{ClientModule, Island, IslandContext, ModuleLoader, ModuleRegistry};
pub use runtime::{ClientRuntime, IslandState};
pub use scanner::{scan, ScanOutput, ScannedIsland};
