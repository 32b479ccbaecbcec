/// Calibration documents exchanged with the intrinsics estimation step and the tracker.
pub mod calibration;

/// Sparse model codecs and model directory I/O.
pub mod colmap;

/// Atomic file writes under an overwrite policy.
pub mod fs;

/// Keyframe mapping files written by the tracker.
pub mod keyframes;
