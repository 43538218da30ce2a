//! # asm_core - Assemblage Core
//!
//! Shared primitives for the composition engine. Everything here is plain
//! data with no rendering behavior:
//! - **Component keys**: the `(namespace, view)` address of a component
//! - **Component definitions**: template reference, renderer tag and
//!   optional client hydration binding
//! - **Hydration ids**: per-render unique node identifiers
//! - **Device classes**: coarse request classification exposed to templates
//!
//! The server side (`asm_render`) and the browser side (`asm_client`) both
//! speak in these types, so the marker contract between them stays in one place.

pub mod component;
pub mod device;
pub mod error;
pub mod hydration;
pub mod id;
pub mod marker;

pub use component::{ComponentDefinition, ComponentKey};
pub use device::DeviceClass;
pub use error::{CoreError, CoreResult};
pub use hydration::{HydrationDirective, HydrationSpec};
pub use id::{HydrationId, HydrationIdGenerator};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::component::{ComponentDefinition, ComponentKey};
    pub use crate::device::DeviceClass;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::hydration::{HydrationDirective, HydrationSpec};
    pub use crate::id::{HydrationId, HydrationIdGenerator};
}
