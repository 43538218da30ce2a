//! Hydration mismatch reports

use asm_core::HydrationId;
use thiserror::Error;

/// Boxed error returned by modules and mount hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an island was left static
#[derive(Debug, Error)]
pub enum HydrationMismatch {
    #[error("Malformed hydration marker: {0}")]
    InvalidMarker(String),

    #[error("Island {id} has no state block")]
    MissingState { id: HydrationId },

    #[error("Island {id} state could not be parsed: {source}")]
    SnapshotParse {
        id: HydrationId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Island {id} module '{module}' failed to load: {cause}")]
    ModuleLoad {
        id: HydrationId,
        module: String,
        #[source]
        cause: BoxError,
    },

    #[error("Island {id} failed to mount: {cause}")]
    MountFailed {
        id: HydrationId,
        #[source]
        cause: BoxError,
    },

    #[error("Hydration id {0} appears on more than one marker")]
    DuplicateId(HydrationId),
}

impl HydrationMismatch {
    /// Island the report concerns, when known
    pub fn island(&self) -> Option<HydrationId> {
        match self {
            Self::InvalidMarker(_) => None,
            Self::MissingState { id }
            | Self::SnapshotParse { id, .. }
            | Self::ModuleLoad { id, .. }
            | Self::MountFailed { id, .. } => Some(*id),
            Self::DuplicateId(id) => Some(*id),
        }
    }
}
