/// Validation failures surfaced by grid, table and training operations.
///
/// Every fallible call checks its preconditions before mutating anything, so an
/// `Err` always leaves the sandbox exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// Grid width or height below the 3x3 minimum.
    #[error("invalid grid dimensions {width}x{height} (minimum 3x3)")]
    InvalidDimension { width: u32, height: u32 },
    /// Coordinate outside the grid.
    #[error("position ({x}, {y}) is out of bounds")]
    OutOfBounds { x: u32, y: u32 },
    /// Attempt to overwrite the fixed start cell.
    #[error("position ({x}, {y}) is the protected start cell")]
    ProtectedCell { x: u32, y: u32 },
    /// Action values requested for a wall cell.
    #[error("position ({x}, {y}) is a wall and has no action values")]
    WallQuery { x: u32, y: u32 },
}
