use std::collections::{HashMap, HashSet};

use splatprep_lie::se3::SE3;

use crate::camera::Camera;

/// A 2D observation of a frame, optionally linked to a 3D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Pixel coordinates (x, y).
    pub xy: [f64; 2],
    /// The observed 3D point, if the observation was triangulated.
    pub point3d_id: Option<u64>,
}

/// A posed frame ("image" in the sparse model format).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame id
    pub frame_id: u32,
    /// Camera id
    pub camera_id: u32,
    /// World-to-camera transform.
    pub camera_from_world: SE3,
    /// Frame name, usually the image file name. May contain spaces.
    pub name: String,
    /// 2D observations, passed through verbatim.
    pub observations: Vec<Observation>,
}

impl Frame {
    /// Create a frame without observations.
    pub fn new(frame_id: u32, camera_id: u32, camera_from_world: SE3, name: impl Into<String>) -> Self {
        Self {
            frame_id,
            camera_id,
            camera_from_world,
            name: name.into(),
            observations: Vec::new(),
        }
    }

    /// The camera-to-world transform.
    pub fn world_from_camera(&self) -> SE3 {
        self.camera_from_world.inverse()
    }

    /// The camera center in world coordinates.
    pub fn camera_center(&self) -> [f64; 3] {
        self.world_from_camera().translation.to_array()
    }

    /// Set the pose from a camera-to-world transform.
    pub fn set_world_from_camera(&mut self, world_from_camera: &SE3) {
        self.camera_from_world = world_from_camera.inverse();
    }
}

/// One element of a 3D point track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackElement {
    /// The observing frame.
    pub frame_id: u32,
    /// Index into the frame observations.
    pub observation_index: u32,
}

/// A reconstructed 3D point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point3d {
    /// Point3d id
    pub point3d_id: u64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color
    pub rgb: [u8; 3],
    /// Reprojection error
    pub error: f64,
    /// Track
    pub track: Vec<TrackElement>,
}

/// The camera set, frame set and 3D point set of a reconstruction.
///
/// Records keep their file order so an encode after a decode reproduces the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseModel {
    /// Cameras
    pub cameras: Vec<Camera>,
    /// Frames
    pub frames: Vec<Frame>,
    /// 3D points
    pub points3d: Vec<Point3d>,
}

/// A structural inconsistency between the entity sets of a [`SparseModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelInconsistency {
    /// Two records of the same kind share an id.
    DuplicateId {
        /// Entity kind, e.g. `camera`.
        kind: &'static str,
        /// The repeated id.
        id: u64,
    },
    /// A frame references a camera that is not in the camera set.
    DanglingReference {
        /// The referencing frame.
        frame_id: u32,
        /// The missing camera.
        camera_id: u32,
    },
    /// A frame name is empty or contains a NUL or line break.
    InvalidName {
        /// The frame with the rejected name.
        frame_id: u32,
        /// Why the name was rejected.
        reason: &'static str,
    },
}

/// Check that a frame name survives both encodings.
pub(crate) fn check_frame_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    if name.contains('\0') {
        return Err("name contains a NUL byte");
    }
    if name.contains(['\n', '\r']) {
        return Err("name contains a line break");
    }
    Ok(())
}

impl SparseModel {
    /// Create a model from its entity sets.
    pub fn new(cameras: Vec<Camera>, frames: Vec<Frame>, points3d: Vec<Point3d>) -> Self {
        Self {
            cameras,
            frames,
            points3d,
        }
    }

    /// Find a camera by id.
    pub fn camera(&self, camera_id: u32) -> Option<&Camera> {
        self.cameras.iter().find(|c| c.camera_id() == camera_id)
    }

    /// Find a frame by name.
    pub fn frame_by_name(&self, name: &str) -> Option<&Frame> {
        self.frames.iter().find(|f| f.name == name)
    }

    /// Index frames by name.
    pub fn frames_by_name(&self) -> HashMap<&str, &Frame> {
        self.frames.iter().map(|f| (f.name.as_str(), f)).collect()
    }

    /// Mean number of observations per frame.
    pub fn mean_observations_per_frame(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let total: usize = self.frames.iter().map(|f| f.observations.len()).sum();
        total as f64 / self.frames.len() as f64
    }

    /// Mean track length per 3D point.
    pub fn mean_track_length(&self) -> f64 {
        if self.points3d.is_empty() {
            return 0.0;
        }
        let total: usize = self.points3d.iter().map(|p| p.track.len()).sum();
        total as f64 / self.points3d.len() as f64
    }

    /// Check id uniqueness and that every frame references a known camera.
    ///
    /// Returns the first inconsistency found.
    pub fn check_consistency(&self) -> Result<(), ModelInconsistency> {
        let mut camera_ids = HashSet::new();
        for camera in &self.cameras {
            if !camera_ids.insert(camera.camera_id()) {
                return Err(ModelInconsistency::DuplicateId {
                    kind: "camera",
                    id: camera.camera_id() as u64,
                });
            }
        }

        let mut frame_ids = HashSet::new();
        for frame in &self.frames {
            if let Err(reason) = check_frame_name(&frame.name) {
                return Err(ModelInconsistency::InvalidName {
                    frame_id: frame.frame_id,
                    reason,
                });
            }
            if !frame_ids.insert(frame.frame_id) {
                return Err(ModelInconsistency::DuplicateId {
                    kind: "frame",
                    id: frame.frame_id as u64,
                });
            }
            if !camera_ids.contains(&frame.camera_id) {
                return Err(ModelInconsistency::DanglingReference {
                    frame_id: frame.frame_id,
                    camera_id: frame.camera_id,
                });
            }
        }

        let mut point_ids = HashSet::new();
        for point in &self.points3d {
            if !point_ids.insert(point.point3d_id) {
                return Err(ModelInconsistency::DuplicateId {
                    kind: "point3d",
                    id: point.point3d_id,
                });
            }
        }

        Ok(())
    }
}
