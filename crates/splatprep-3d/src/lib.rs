#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera model registry and cameras.
pub mod camera;

/// I/O utilities for reading and writing sparse models and their side files.
pub mod io;

/// Cameras, frames and 3D points of a sparse reconstruction.
pub mod model;

/// Intrinsics rescaling to a new image resolution.
pub mod rescale;

/// Natural ordering of frame names and image sequence listing.
pub mod sequence;

/// Keyframe pose interpolation over a full capture sequence.
pub mod trajectory;
