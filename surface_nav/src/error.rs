// Error type for the navigation pipeline.
//
// Build-time failures (bad sample grids, bad config) are reported through
// `NavError`. Pathfinding never produces a `NavError`: search outcomes are
// values (`SearchStatus` in `graph_search.rs`), including the failure case.

use crate::types::GridDims;

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("invalid sample grid {dims}: expected at least {expected} samples, got {actual}")]
    InvalidInput {
        dims: GridDims,
        expected: usize,
        actual: usize,
    },
    #[error("grid dimensions must all be at least 1, got {0}")]
    InvalidDimensions(GridDims),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("no navigable surface")]
    NoNavigableSurface,
    #[error("graph node {0} is not a live element")]
    InvalidNode(u32),
}
