#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Splatprep Lie Groups
//!
//! Double precision rotations and rigid body transformations used to carry camera poses
//! through the sparse model codecs and the keyframe pose interpolator.
//!
//! ## Supported Groups
//!
//! - **SO(3)**: 3D rotation group, stored as a unit quaternion
//! - **SE(3)**: 3D rigid body transformations (rotation + translation)
//!
//! ## Example
//!
//! ```rust
//! use splatprep_lie::se3::SE3;
//! use glam::DVec3;
//!
//! let a = SE3::from_translation(DVec3::ZERO);
//! let b = SE3::from_translation(DVec3::new(10.0, 0.0, 0.0));
//!
//! let mid = SE3::interpolate(&a, &b, 0.5);
//! assert_eq!(mid.translation, DVec3::new(5.0, 0.0, 0.0));
//! ```

/// Special Euclidean group SE(3) for 3D rigid transformations.
pub mod se3;

/// Special Orthogonal group SO(3) for 3D rotations.
pub mod so3;
