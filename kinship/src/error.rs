//! Error types
//!
//! Nothing here is fatal to an editing session. Callers at the session and
//! commit level log these and carry on with the relation omitted.

use thiserror::Error;

use crate::components::{PawnId, PawnKind};

/// Which side of a relation failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Source => write!(f, "source"),
            Endpoint::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum KinshipError {
    #[error("could not find matching {endpoint} pawn {id} of kind {kind:?}")]
    Unresolved {
        id: PawnId,
        kind: PawnKind,
        endpoint: Endpoint,
    },

    #[error("relation type {0} has no creation routine")]
    UnsupportedType(String),

    #[error("unknown relation type {0}")]
    UnknownDefinition(String),

    #[error("unknown pawn {0}")]
    UnknownPawn(PawnId),

    #[error("pawn generation failed: {0}")]
    Generation(String),

    #[error("group has no children to anchor ages on")]
    EmptyGroup,

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KinshipError>;
