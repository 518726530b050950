//! Error types for the layout engine
//!
//! Every fallible operation returns [`LayoutError`]. Most variants wrap a
//! primitive [`Cause`] together with the value that was rejected, so callers
//! can match on the cause without parsing messages.

use crate::entity::EntityId;
use std::fmt;

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Primitive reason carried by most [`LayoutError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    IsDuplicated,
    NotFound,
    IsNegative,
    OutOfBounds,
    IsZero,
    Intersects,
    TooSmall,
    TooBig,
    NotClear,
    InUse,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Cause::IsDuplicated => "is duplicated",
            Cause::NotFound => "not found",
            Cause::IsNegative => "is negative",
            Cause::OutOfBounds => "out of bounds",
            Cause::IsZero => "is zero",
            Cause::Intersects => "intersects",
            Cause::TooSmall => "too small",
            Cause::TooBig => "too big",
            Cause::NotClear => "not clear",
            Cause::InUse => "in use",
        };
        f.write_str(msg)
    }
}

/// Errors that can occur while building or mutating a layout
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("argument error; name:{name:?} : {cause}")]
    Arg { name: String, cause: Cause },

    #[error("name error; name:{name:?} : {cause}")]
    Name { name: String, cause: Cause },

    #[error("start pos error; start_pos:{start_pos} : {cause}")]
    StartPos { start_pos: usize, cause: Cause },

    #[error("size error; size:{size} : {cause}")]
    Size { size: usize, cause: Cause },

    #[error("intersect with {with:?}")]
    Intersect { with: String },

    #[error("layout id error; layout_id:{layout_id} : {cause}")]
    LayoutId { layout_id: usize, cause: Cause },

    #[error("index error; index:{index} : {cause}")]
    Index { index: u64, cause: Cause },

    #[error("conversion error; from:{from:?}, to:{to:?}")]
    Conversion { from: String, to: String },

    #[error("entity id error; entity_id:{id} : {cause}")]
    EntityId { id: EntityId, cause: Cause },

    #[error("attribute value error; attribute:{name:?} : {reason}")]
    AttributeValue { name: String, reason: String },

    #[error("{name:?} is still referenced {references} time(s)")]
    Reference { name: String, references: usize },

    #[error("signal {name:?} is a muxor; remove its multiplexed layer instead")]
    Muxor { name: String },
}

impl LayoutError {
    pub(crate) fn arg(name: &str, cause: Cause) -> Self {
        LayoutError::Arg {
            name: name.to_string(),
            cause,
        }
    }

    pub(crate) fn name(name: &str, cause: Cause) -> Self {
        LayoutError::Name {
            name: name.to_string(),
            cause,
        }
    }

    pub(crate) fn not_found(id: EntityId) -> Self {
        LayoutError::EntityId {
            id,
            cause: Cause::NotFound,
        }
    }

    /// Primitive cause, if the variant carries one
    pub fn cause(&self) -> Option<Cause> {
        match self {
            LayoutError::Arg { cause, .. }
            | LayoutError::Name { cause, .. }
            | LayoutError::StartPos { cause, .. }
            | LayoutError::Size { cause, .. }
            | LayoutError::LayoutId { cause, .. }
            | LayoutError::Index { cause, .. }
            | LayoutError::EntityId { cause, .. } => Some(*cause),
            LayoutError::Intersect { .. } => Some(Cause::Intersects),
            LayoutError::Reference { .. } => Some(Cause::InUse),
            _ => None,
        }
    }
}
