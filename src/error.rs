//! Error taxonomy (spec §7). `GeometryError` is the only thing the core
//! returns as an `Err` from a `Result` — repair genuinely can fail on
//! pathological input. Everything else in the table is data, recorded on
//! an [`crate::model::UnplacedCarpet`], because the scheduler never aborts
//! on bad user data.

use thiserror::Error;

/// Failure of the zero-width-buffer repair pass (C1).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("polygon could not be repaired into a simple polygon with positive area")]
    RepairFailed,
    #[error("angle {0} is not one of the four cardinal rotations (0/90/180/270)")]
    InvalidAngle(u16),
}

/// Why a carpet did not end up on any emitted sheet. Attached to
/// [`crate::model::UnplacedCarpet`], never thrown.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnplacedReason {
    #[error("polygon failed geometry repair")]
    InvalidGeometry,
    #[error("no matching sheet can hold the carpet in either orientation")]
    OversizeForColor,
    #[error("no inventory descriptor matches the carpet's color")]
    NoInventoryForColor,
    #[error("inventory for this color is exhausted")]
    Exhausted,
    #[error("no already-open sheet of this color has room, and priority-2 never opens a new one")]
    NoVoidForColor,
    #[error("scheduling was cancelled before this carpet could be placed")]
    Cancelled,
}
