mod binary;
mod files;
mod text;

pub use binary::*;
pub use files::*;
pub use text::*;

use crate::camera::{CameraError, CameraModelError};
use crate::io::fs::WriteError;
use crate::model::ModelInconsistency;

/// Point id the binary format uses for an observation without a 3D point.
const INVALID_POINT3D_ID: u64 = u64::MAX;

/// Error types for the COLMAP module.
#[derive(Debug, thiserror::Error)]
pub enum ColmapError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Error writing a model to disk under an overwrite policy
    #[error(transparent)]
    WriteError(#[from] WriteError),

    /// The camera model id or name is not known
    #[error(transparent)]
    UnknownCameraModel(#[from] CameraModelError),

    /// A binary camera record does not describe a valid camera
    #[error("Invalid camera {camera_id}: {source}")]
    InvalidCamera {
        /// The camera id of the record.
        camera_id: u32,
        /// The validation failure.
        source: CameraError,
    },

    /// The binary input ended in the middle of a record
    #[error("Truncated input in {section} at byte {offset}")]
    TruncatedInput {
        /// The section being decoded.
        section: &'static str,
        /// Byte offset of the incomplete read.
        offset: usize,
    },

    /// The binary input has bytes after the last record
    #[error("Unexpected {count} trailing bytes in {section}")]
    TrailingBytes {
        /// The section being decoded.
        section: &'static str,
        /// Number of unread bytes.
        count: usize,
    },

    /// A text line could not be parsed
    #[error("Malformed line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A frame references a camera missing from the camera set
    #[error("Frame {frame_id} references missing camera {camera_id}")]
    DanglingReference {
        /// The referencing frame.
        frame_id: u32,
        /// The missing camera.
        camera_id: u32,
    },

    /// Two records of the same kind share an id
    #[error("Duplicate {kind} id {id}")]
    DuplicateId {
        /// Entity kind.
        kind: &'static str,
        /// The repeated id.
        id: u64,
    },

    /// A frame name cannot be stored in the format
    #[error("Invalid name for frame {frame_id}: {reason}")]
    InvalidName {
        /// The frame id.
        frame_id: u32,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A frame rotation cannot be normalized
    #[error("Invalid rotation quaternion for frame {frame_id}")]
    InvalidQuaternion {
        /// The frame id.
        frame_id: u32,
    },
}

impl From<ModelInconsistency> for ColmapError {
    fn from(value: ModelInconsistency) -> Self {
        match value {
            ModelInconsistency::DuplicateId { kind, id } => ColmapError::DuplicateId { kind, id },
            ModelInconsistency::DanglingReference {
                frame_id,
                camera_id,
            } => ColmapError::DanglingReference {
                frame_id,
                camera_id,
            },
            ModelInconsistency::InvalidName { frame_id, reason } => {
                ColmapError::InvalidName { frame_id, reason }
            }
        }
    }
}

/// The three per-entity buffers that make up an encoded sparse model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFiles<T> {
    /// Camera section (`cameras.bin` / `cameras.txt`)
    pub cameras: T,
    /// Frame section (`images.bin` / `images.txt`)
    pub images: T,
    /// Point section (`points3D.bin` / `points3D.txt`)
    pub points3d: T,
}

impl<T> ModelFiles<T> {
    /// Borrow every buffer.
    pub fn borrowed<U: ?Sized>(&self) -> ModelFiles<&U>
    where
        T: AsRef<U>,
    {
        ModelFiles {
            cameras: self.cameras.as_ref(),
            images: self.images.as_ref(),
            points3d: self.points3d.as_ref(),
        }
    }
}
