use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use splatprep_lie::se3::SE3;

use crate::model::{Frame, SparseModel};
use crate::sequence::natural_cmp;

/// Error types for the pose trajectory interpolator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    /// None of the keyframes is part of the sequence
    #[error("No keyframes found in the image sequence")]
    NoKeyframesFound,

    /// The sequence is not in increasing natural order
    #[error("Sequence is not in natural order at position {position}: {name}")]
    UnorderedSequence {
        /// Position of the first out of order name.
        position: usize,
        /// The out of order name.
        name: String,
    },

    /// A name appears twice in the sequence
    #[error("Duplicate frame in sequence: {0}")]
    DuplicateFrame(String),

    /// A keyframe named by the mapping has no pose in the keyframe model
    #[error("Keyframe {0} has no pose in the keyframe model")]
    MissingKeyframePose(String),

    /// The sequence does not fit the 32-bit frame id range
    #[error("Sequence of {0} frames exceeds the frame id range")]
    TooManyFrames(usize),
}

/// How a sequence position obtains its pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameClass {
    /// The exact keyframe pose.
    Keyframe,
    /// Before the first keyframe; clamped to it.
    BeforeFirst,
    /// After the last keyframe; clamped to it.
    AfterLast,
    /// Interpolated between the keyframes at positions `prev` and `next`.
    Between {
        /// Position of the preceding keyframe.
        prev: usize,
        /// Position of the following keyframe.
        next: usize,
        /// `(i - prev) / (next - prev)`
        alpha: f64,
    },
}

/// A known keyframe pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyframePose {
    /// The camera of the keyframe.
    pub camera_id: u32,
    /// World-to-camera transform.
    pub camera_from_world: SE3,
}

/// The pose assigned to one sequence position.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedPose {
    /// Frame name.
    pub name: String,
    /// The keyframe camera, or the reference camera for non-keyframes.
    pub camera_id: u32,
    /// World-to-camera transform.
    pub camera_from_world: SE3,
    /// How the pose was obtained.
    pub class: FrameClass,
}

/// Options of the pose trajectory interpolator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationOptions {
    /// Id of the first frame written by [`densify_model`].
    pub first_frame_id: u32,
    /// Reject sequences that are not strictly increasing in natural order.
    pub validate_order: bool,
}

impl Default for InterpolationOptions {
    fn default() -> Self {
        Self {
            first_frame_id: 1,
            validate_order: true,
        }
    }
}

/// Check that a sequence is strictly increasing in natural order.
pub fn check_sequence_order<S: AsRef<str>>(sequence: &[S]) -> Result<(), InterpolationError> {
    for (position, pair) in sequence.windows(2).enumerate() {
        let (a, b) = (pair[0].as_ref(), pair[1].as_ref());
        match natural_cmp(a, b) {
            Ordering::Less => {}
            Ordering::Equal => return Err(InterpolationError::DuplicateFrame(b.to_string())),
            Ordering::Greater => {
                return Err(InterpolationError::UnorderedSequence {
                    position: position + 1,
                    name: b.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Classify every position of a sequence of `len` frames.
///
/// `keyframe_positions` must be sorted and within `0..len`.
pub fn classify_positions(len: usize, keyframe_positions: &[usize]) -> Vec<FrameClass> {
    let (Some(&first), Some(&last)) = (keyframe_positions.first(), keyframe_positions.last())
    else {
        return Vec::new();
    };

    let mut classes = Vec::with_capacity(len);
    // index of the next keyframe at or after the current position
    let mut next_kf = 0;
    for i in 0..len {
        while next_kf < keyframe_positions.len() && keyframe_positions[next_kf] < i {
            next_kf += 1;
        }

        let class = if keyframe_positions.get(next_kf) == Some(&i) {
            FrameClass::Keyframe
        } else if i < first {
            FrameClass::BeforeFirst
        } else if i > last {
            FrameClass::AfterLast
        } else {
            let prev = keyframe_positions[next_kf - 1];
            let next = keyframe_positions[next_kf];
            FrameClass::Between {
                prev,
                next,
                alpha: (i - prev) as f64 / (next - prev) as f64,
            }
        };
        classes.push(class);
    }
    classes
}

fn keyframe_pose<'a, S: AsRef<str>>(
    sequence: &[S],
    keyframes: &'a HashMap<String, KeyframePose>,
    position: usize,
) -> Result<&'a KeyframePose, InterpolationError> {
    let name = sequence[position].as_ref();
    keyframes
        .get(name)
        .ok_or_else(|| InterpolationError::MissingKeyframePose(name.to_string()))
}

/// Produce one pose per sequence position from a sparse set of keyframe poses.
///
/// Keyframes keep their exact pose and camera. Positions before the first or after
/// the last keyframe are clamped to it. Positions in between interpolate the
/// bracketing keyframes: SLERP for the rotation, linear for the translation. Every
/// non-keyframe position uses the camera of the first keyframe in sequence order.
///
/// # Arguments
///
/// * `sequence` - All frame names of the capture, in natural order.
/// * `keyframes` - Exact poses by frame name. Names outside the sequence are ignored.
/// * `options` - Interpolation options.
///
/// # Returns
///
/// One pose per sequence position.
pub fn interpolate_poses<S: AsRef<str>>(
    sequence: &[S],
    keyframes: &HashMap<String, KeyframePose>,
    options: &InterpolationOptions,
) -> Result<Vec<InterpolatedPose>, InterpolationError> {
    if options.validate_order {
        check_sequence_order(sequence)?;
    }

    let keyframe_positions = sequence
        .iter()
        .enumerate()
        .filter(|(_, name)| keyframes.contains_key(name.as_ref()))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let (Some(&first), Some(&last)) = (keyframe_positions.first(), keyframe_positions.last())
    else {
        return Err(InterpolationError::NoKeyframesFound);
    };

    let pose_at = |position: usize| keyframe_pose(sequence, keyframes, position);
    let first_pose = pose_at(first)?;
    let last_pose = pose_at(last)?;
    let reference_camera_id = first_pose.camera_id;

    log::info!(
        "found {} keyframes in a sequence of {} frames (first at {}, last at {})",
        keyframe_positions.len(),
        sequence.len(),
        first,
        last
    );

    let classes = classify_positions(sequence.len(), &keyframe_positions);
    let mut poses = Vec::with_capacity(sequence.len());
    for (i, (name, class)) in sequence.iter().zip(classes).enumerate() {
        let (camera_id, camera_from_world) = match class {
            FrameClass::Keyframe => {
                let pose = pose_at(i)?;
                (pose.camera_id, pose.camera_from_world)
            }
            FrameClass::BeforeFirst => (reference_camera_id, first_pose.camera_from_world),
            FrameClass::AfterLast => (reference_camera_id, last_pose.camera_from_world),
            FrameClass::Between { prev, next, alpha } => (
                reference_camera_id,
                SE3::interpolate(
                    &pose_at(prev)?.camera_from_world,
                    &pose_at(next)?.camera_from_world,
                    alpha,
                ),
            ),
        };
        poses.push(InterpolatedPose {
            name: name.as_ref().to_string(),
            camera_id,
            camera_from_world,
            class,
        });
    }

    Ok(poses)
}

/// Expand a keyframe-only model to the full capture sequence.
///
/// Frames get ids `first_frame_id..` in sequence order and poses from
/// [`interpolate_poses`]. Keyframes keep their observations; interpolated frames have
/// none. Cameras are copied, and point tracks are rewritten to the new frame ids,
/// dropping entries of keyframes that are not part of the sequence.
///
/// # Arguments
///
/// * `keyframe_model` - The model holding the keyframe poses, matched by frame name.
/// * `keyframe_names` - The keyframe file names from the keyframe mapping.
/// * `sequence` - All frame names of the capture, in natural order.
/// * `options` - Interpolation options.
pub fn densify_model<S: AsRef<str>>(
    keyframe_model: &SparseModel,
    keyframe_names: &[S],
    sequence: &[S],
    options: &InterpolationOptions,
) -> Result<SparseModel, InterpolationError> {
    let first_frame_id = options.first_frame_id;
    if u32::try_from(sequence.len())
        .ok()
        .and_then(|len| first_frame_id.checked_add(len))
        .is_none()
    {
        return Err(InterpolationError::TooManyFrames(sequence.len()));
    }

    let in_sequence = sequence.iter().map(|s| s.as_ref()).collect::<HashSet<_>>();
    let frames_by_name = keyframe_model.frames_by_name();

    let mut keyframe_frames: HashMap<String, &Frame> = HashMap::new();
    for name in keyframe_names {
        let name = name.as_ref();
        if !in_sequence.contains(name) {
            log::warn!("keyframe {name} is not part of the image sequence, ignoring it");
            continue;
        }
        let frame = frames_by_name
            .get(name)
            .copied()
            .ok_or_else(|| InterpolationError::MissingKeyframePose(name.to_string()))?;
        keyframe_frames.insert(name.to_string(), frame);
    }

    let keyframe_poses = keyframe_frames
        .iter()
        .map(|(name, frame)| {
            (
                name.clone(),
                KeyframePose {
                    camera_id: frame.camera_id,
                    camera_from_world: frame.camera_from_world,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    let poses = interpolate_poses(sequence, &keyframe_poses, options)?;

    let mut new_frame_ids: HashMap<u32, u32> = HashMap::new();
    let mut frames = Vec::with_capacity(poses.len());
    for (frame_id, pose) in (first_frame_id..).zip(poses) {
        let mut frame = Frame::new(frame_id, pose.camera_id, pose.camera_from_world, pose.name);
        if let (FrameClass::Keyframe, Some(keyframe)) =
            (pose.class, keyframe_frames.get(&frame.name))
        {
            frame.observations = keyframe.observations.clone();
            new_frame_ids.insert(keyframe.frame_id, frame_id);
        }
        frames.push(frame);
    }

    let mut dropped = 0;
    let points3d = keyframe_model
        .points3d
        .iter()
        .map(|point| {
            let mut point = point.clone();
            let len = point.track.len();
            point.track = point
                .track
                .iter()
                .filter_map(|element| {
                    new_frame_ids.get(&element.frame_id).map(|&frame_id| {
                        let mut element = *element;
                        element.frame_id = frame_id;
                        element
                    })
                })
                .collect();
            dropped += len - point.track.len();
            point
        })
        .collect::<Vec<_>>();

    let num_keyframes = new_frame_ids.len();
    log::info!(
        "densified {} keyframes into {} frames ({} interpolated)",
        num_keyframes,
        frames.len(),
        frames.len() - num_keyframes
    );
    if dropped > 0 {
        log::warn!("dropped {dropped} track entries of keyframes outside the sequence");
    }

    Ok(SparseModel::new(
        keyframe_model.cameras.clone(),
        frames,
        points3d,
    ))
}
