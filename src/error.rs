//! Fatal configuration errors.
//!
//! Every variant aborts the run it occurs in. Functions in this crate return
//! `anyhow::Result`; callers that need to tell the cases apart use
//! `err.downcast_ref::<DetectorError>()`.

/// Errors that end a run: unresolved names, missing hits, broken geometry
/// and misuse of the analysis output.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// A material name could not be resolved.
    #[error("cannot retrieve material '{0}'")]
    MaterialNotFound(String),

    /// A logical volume name could not be resolved.
    #[error("logical volume '{0}' not found")]
    LogicalVolumeNotFound(String),

    /// A hits collection was not registered under this name.
    #[error("cannot access hits collection '{0}'")]
    CollectionNotFound(String),

    /// A hits collection exists but holds no hit for the event.
    #[error("hits collection '{0}' has no entries")]
    EmptyCollection(String),

    /// A step was attributed to a cell the detector does not have.
    #[error("cell {cell} out of range for detector '{detector}' ({cells} cells)")]
    CellOutOfRange {
        /// Sensitive detector name.
        detector: String,
        /// Computed cell index.
        cell: usize,
        /// Number of cells booked.
        cells: usize,
    },

    /// Two placed volumes share space, or a daughter sticks out of its mother.
    #[error("volume '{volume}' overlaps '{other}'")]
    Overlap {
        /// Volume being placed.
        volume: String,
        /// Sibling or mother it collides with.
        other: String,
    },

    /// The output file extension selects a format this crate cannot write.
    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),

    /// The analysis output was used in the wrong state.
    #[error("analysis output is {state}: cannot {action}")]
    SinkState {
        /// Current state.
        state: &'static str,
        /// Attempted operation.
        action: &'static str,
    },

    /// A histogram or n-tuple column was booked or addressed incorrectly.
    #[error("booking error: {0}")]
    Booking(String),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
