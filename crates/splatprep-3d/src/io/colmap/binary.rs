use splatprep_lie::se3::SE3;

use super::{ColmapError, ModelFiles, INVALID_POINT3D_ID};
use crate::camera::{Camera, CameraModel};
use crate::model::{Frame, Observation, Point3d, SparseModel, TrackElement};

// smallest possible encoded size of each record, used to bound allocations
const MIN_CAMERA_RECORD: usize = 4 + 4 + 8 + 8 + 3 * 8;
const MIN_FRAME_RECORD: usize = 4 + 7 * 8 + 4 + 1 + 8;
const OBSERVATION_RECORD: usize = 3 * 8;
const MIN_POINT_RECORD: usize = 8 + 3 * 8 + 3 + 8 + 8;
const TRACK_RECORD: usize = 4 + 4;

/// Little-endian reader over one binary section.
struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
    section: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8], section: &'static str) -> Self {
        Self {
            buf,
            offset: 0,
            section,
        }
    }

    fn truncated(&self) -> ColmapError {
        ColmapError::TruncatedInput {
            section: self.section,
            offset: self.offset,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ColmapError> {
        let end = self.offset.checked_add(n).ok_or_else(|| self.truncated())?;
        let slice = self.buf.get(self.offset..end).ok_or_else(|| self.truncated())?;
        self.offset = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ColmapError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, ColmapError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ColmapError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, ColmapError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ColmapError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, ColmapError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_f64s<const N: usize>(&mut self) -> Result<[f64; N], ColmapError> {
        let mut values = [0.0; N];
        for value in values.iter_mut() {
            *value = self.read_f64()?;
        }
        Ok(values)
    }

    /// Read a record count and check the remaining bytes can hold that many records.
    fn read_count(&mut self, min_record_size: usize) -> Result<usize, ColmapError> {
        let count = self.read_u64()?;
        let remaining = (self.buf.len() - self.offset) as u64;
        if count.saturating_mul(min_record_size as u64) > remaining {
            return Err(self.truncated());
        }
        Ok(count as usize)
    }

    /// Read bytes up to a NUL terminator, consuming the terminator.
    fn read_cstr(&mut self) -> Result<&'a [u8], ColmapError> {
        let rest = &self.buf[self.offset..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| ColmapError::TruncatedInput {
                section: self.section,
                offset: self.buf.len(),
            })?;
        let bytes = self.take(len)?;
        self.offset += 1;
        Ok(bytes)
    }

    fn finish(self) -> Result<(), ColmapError> {
        let count = self.buf.len() - self.offset;
        if count > 0 {
            return Err(ColmapError::TrailingBytes {
                section: self.section,
                count,
            });
        }
        Ok(())
    }
}

/// Decode the camera section of a binary model.
///
/// The number of parameters of each record is implied by its model id.
///
/// # Arguments
///
/// * `bytes` - The content of a `cameras.bin` file.
///
/// # Returns
///
/// The cameras in file order.
pub fn decode_cameras_binary(bytes: &[u8]) -> Result<Vec<Camera>, ColmapError> {
    let mut reader = ByteReader::new(bytes, "cameras");
    let num_cameras = reader.read_count(MIN_CAMERA_RECORD)?;

    let mut cameras = Vec::with_capacity(num_cameras);
    for _ in 0..num_cameras {
        // stored as int32 by older writers; ids are positive so the bytes agree
        let camera_id = reader.read_u32()?;
        let model = CameraModel::from_id(reader.read_i32()?)?;
        let width = reader.read_u64()?;
        let height = reader.read_u64()?;
        let params = (0..model.num_params())
            .map(|_| reader.read_f64())
            .collect::<Result<Vec<_>, _>>()?;

        let camera = Camera::new(camera_id, model, width, height, params)
            .map_err(|source| ColmapError::InvalidCamera { camera_id, source })?;
        cameras.push(camera);
    }
    reader.finish()?;

    Ok(cameras)
}

/// Decode the frame section (`images.bin`) of a binary model.
pub fn decode_frames_binary(bytes: &[u8]) -> Result<Vec<Frame>, ColmapError> {
    let mut reader = ByteReader::new(bytes, "images");
    let num_frames = reader.read_count(MIN_FRAME_RECORD)?;

    let mut frames = Vec::with_capacity(num_frames);
    for _ in 0..num_frames {
        let frame_id = reader.read_u32()?;
        let wxyz = reader.read_f64s::<4>()?;
        let translation = reader.read_f64s::<3>()?;
        let camera_id = reader.read_u32()?;
        let name = std::str::from_utf8(reader.read_cstr()?)
            .map_err(|_| ColmapError::InvalidName {
                frame_id,
                reason: "name is not valid UTF-8",
            })?
            .to_string();

        let num_observations = reader.read_count(OBSERVATION_RECORD)?;
        let mut observations = Vec::with_capacity(num_observations);
        for _ in 0..num_observations {
            let xy = reader.read_f64s::<2>()?;
            let point3d_id = reader.read_u64()?;
            observations.push(Observation {
                xy,
                point3d_id: (point3d_id != INVALID_POINT3D_ID).then_some(point3d_id),
            });
        }

        let camera_from_world = SE3::from_wxyz_translation(wxyz, translation)
            .ok_or(ColmapError::InvalidQuaternion { frame_id })?;

        frames.push(Frame {
            frame_id,
            camera_id,
            camera_from_world,
            name,
            observations,
        });
    }
    reader.finish()?;

    Ok(frames)
}

/// Decode the point section (`points3D.bin`) of a binary model.
pub fn decode_points3d_binary(bytes: &[u8]) -> Result<Vec<Point3d>, ColmapError> {
    let mut reader = ByteReader::new(bytes, "points3D");
    let num_points = reader.read_count(MIN_POINT_RECORD)?;

    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let point3d_id = reader.read_u64()?;
        let xyz = reader.read_f64s::<3>()?;
        let rgb = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
        let error = reader.read_f64()?;

        let track_len = reader.read_count(TRACK_RECORD)?;
        let track = (0..track_len)
            .map(|_| -> Result<TrackElement, ColmapError> {
                Ok(TrackElement {
                    frame_id: reader.read_u32()?,
                    observation_index: reader.read_u32()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        points.push(Point3d {
            point3d_id,
            xyz,
            rgb,
            error,
            track,
        });
    }
    reader.finish()?;

    Ok(points)
}

/// Decode a complete binary model.
///
/// Decoding is all-or-nothing: any structural error, unknown camera model or frame
/// referencing a missing camera aborts the whole decode.
pub fn decode_binary(files: &ModelFiles<&[u8]>) -> Result<SparseModel, ColmapError> {
    let model = SparseModel::new(
        decode_cameras_binary(files.cameras)?,
        decode_frames_binary(files.images)?,
        decode_points3d_binary(files.points3d)?,
    );
    model.check_consistency()?;

    log::debug!(
        "decoded binary model: {} cameras, {} frames, {} points",
        model.cameras.len(),
        model.frames.len(),
        model.points3d.len()
    );

    Ok(model)
}

/// Encode cameras into the binary camera section.
///
/// No parameter count is written; readers derive it from the model id.
pub fn encode_cameras_binary(cameras: &[Camera]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + cameras.len() * (MIN_CAMERA_RECORD + 9 * 8));
    buf.extend_from_slice(&(cameras.len() as u64).to_le_bytes());
    for camera in cameras {
        buf.extend_from_slice(&camera.camera_id().to_le_bytes());
        buf.extend_from_slice(&camera.model().id().to_le_bytes());
        buf.extend_from_slice(&camera.width().to_le_bytes());
        buf.extend_from_slice(&camera.height().to_le_bytes());
        for param in camera.params() {
            buf.extend_from_slice(&param.to_le_bytes());
        }
    }
    buf
}

/// Encode frames into the binary frame section.
pub fn encode_frames_binary(frames: &[Frame]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + frames.len() * (MIN_FRAME_RECORD + 32));
    buf.extend_from_slice(&(frames.len() as u64).to_le_bytes());
    for frame in frames {
        buf.extend_from_slice(&frame.frame_id.to_le_bytes());
        for q in frame.camera_from_world.to_wxyz() {
            buf.extend_from_slice(&q.to_le_bytes());
        }
        for t in frame.camera_from_world.translation.to_array() {
            buf.extend_from_slice(&t.to_le_bytes());
        }
        buf.extend_from_slice(&frame.camera_id.to_le_bytes());
        buf.extend_from_slice(frame.name.as_bytes());
        buf.push(0);

        buf.extend_from_slice(&(frame.observations.len() as u64).to_le_bytes());
        for observation in &frame.observations {
            buf.extend_from_slice(&observation.xy[0].to_le_bytes());
            buf.extend_from_slice(&observation.xy[1].to_le_bytes());
            let point3d_id = observation.point3d_id.unwrap_or(INVALID_POINT3D_ID);
            buf.extend_from_slice(&point3d_id.to_le_bytes());
        }
    }
    buf
}

/// Encode points into the binary point section.
pub fn encode_points3d_binary(points: &[Point3d]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + points.len() * MIN_POINT_RECORD);
    buf.extend_from_slice(&(points.len() as u64).to_le_bytes());
    for point in points {
        buf.extend_from_slice(&point.point3d_id.to_le_bytes());
        for v in point.xyz {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&point.rgb);
        buf.extend_from_slice(&point.error.to_le_bytes());
        buf.extend_from_slice(&(point.track.len() as u64).to_le_bytes());
        for element in &point.track {
            buf.extend_from_slice(&element.frame_id.to_le_bytes());
            buf.extend_from_slice(&element.observation_index.to_le_bytes());
        }
    }
    buf
}

/// Encode a complete model into its three binary sections.
pub fn encode_binary(model: &SparseModel) -> ModelFiles<Vec<u8>> {
    ModelFiles {
        cameras: encode_cameras_binary(&model.cameras),
        images: encode_frames_binary(&model.frames),
        points3d: encode_points3d_binary(&model.points3d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraModelError;
    use glam::DVec3;
    use splatprep_lie::so3::SO3;

    fn sample_model() -> SparseModel {
        let cameras = vec![
            Camera::new(1, CameraModel::Pinhole, 1600, 1400, vec![1000.0, 1000.0, 800.0, 700.0])
                .unwrap(),
            Camera::new(
                2,
                CameraModel::OpenCV,
                5568,
                4872,
                vec![3480.0, 3481.5, 2784.0, 2436.0, 0.01, -0.002, 0.0001, 0.0002],
            )
            .unwrap(),
        ];

        let mut first = Frame::new(
            1,
            1,
            SE3::new(SO3::exp(DVec3::new(0.1, -0.2, 0.3)), DVec3::new(1.0, 2.0, 3.0)),
            "2019A GP Left (1).png",
        );
        first.observations = vec![
            Observation {
                xy: [10.5, 20.25],
                point3d_id: Some(7),
            },
            Observation {
                xy: [-1.0, 3.0e-9],
                point3d_id: None,
            },
        ];
        let second = Frame::new(2, 2, SE3::IDENTITY, "frame_0002.jpg");

        let points = vec![Point3d {
            point3d_id: 7,
            xyz: [0.5, -0.25, 12.0],
            rgb: [255, 128, 0],
            error: 0.75,
            track: vec![TrackElement {
                frame_id: 1,
                observation_index: 0,
            }],
        }];

        SparseModel::new(cameras, vec![first, second], points)
    }

    #[test]
    fn test_roundtrip() -> Result<(), ColmapError> {
        let model = sample_model();
        let encoded = encode_binary(&model);
        let decoded = decode_binary(&encoded.borrowed())?;
        assert_eq!(decoded, model);
        Ok(())
    }

    #[test]
    fn test_camera_layout_has_no_param_count() {
        let camera =
            Camera::new(5, CameraModel::SimplePinhole, 640, 480, vec![500.0, 320.0, 240.0]).unwrap();
        let bytes = encode_cameras_binary(&[camera]);

        // count + id + model + width + height + 3 params
        assert_eq!(bytes.len(), 8 + 4 + 4 + 8 + 8 + 3 * 8);
        assert_eq!(&bytes[0..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &5u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0i32.to_le_bytes());
        assert_eq!(&bytes[16..24], &640u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &480u64.to_le_bytes());
        assert_eq!(&bytes[32..40], &500.0f64.to_le_bytes());
    }

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(3, 9, SE3::IDENTITY, "a b");
        let bytes = encode_frames_binary(&[frame]);

        assert_eq!(bytes.len(), 8 + 4 + 7 * 8 + 4 + 4 + 8);
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..20], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[68..72], &9u32.to_le_bytes());
        assert_eq!(&bytes[72..76], b"a b\0");
        assert_eq!(&bytes[76..84], &0u64.to_le_bytes());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&99i32.to_le_bytes());
        bytes.extend_from_slice(&640u64.to_le_bytes());
        bytes.extend_from_slice(&480u64.to_le_bytes());
        for p in [500.0f64, 500.0, 320.0, 240.0] {
            bytes.extend_from_slice(&p.to_le_bytes());
        }

        let res = decode_cameras_binary(&bytes);
        assert!(matches!(
            res,
            Err(ColmapError::UnknownCameraModel(CameraModelError::UnknownId(99)))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let model = sample_model();
        let encoded = encode_binary(&model);

        for cut in [0, 7, 12, encoded.cameras.len() - 1] {
            let res = decode_cameras_binary(&encoded.cameras[..cut]);
            assert!(
                matches!(res, Err(ColmapError::TruncatedInput { section: "cameras", .. })),
                "cut at {cut}"
            );
        }

        let res = decode_frames_binary(&encoded.images[..encoded.images.len() - 3]);
        assert!(matches!(res, Err(ColmapError::TruncatedInput { .. })));

        let res = decode_points3d_binary(&encoded.points3d[..20]);
        assert!(matches!(res, Err(ColmapError::TruncatedInput { .. })));
    }

    #[test]
    fn test_huge_count_is_truncation() {
        let bytes = u64::MAX.to_le_bytes();
        assert!(matches!(
            decode_points3d_binary(&bytes),
            Err(ColmapError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode_points3d_binary(&sample_model().points3d);
        bytes.push(0);
        assert!(matches!(
            decode_points3d_binary(&bytes),
            Err(ColmapError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn test_dangling_reference() {
        let mut model = sample_model();
        model.frames[1].camera_id = 42;
        let encoded = encode_binary(&model);

        let res = decode_binary(&encoded.borrowed());
        assert!(matches!(
            res,
            Err(ColmapError::DanglingReference {
                frame_id: 2,
                camera_id: 42
            })
        ));
    }

    #[test]
    fn test_unnormalized_quaternion_is_normalized() -> Result<(), ColmapError> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [2.0f64, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(b"x.png\0");
        bytes.extend_from_slice(&0u64.to_le_bytes());

        let frames = decode_frames_binary(&bytes)?;
        assert_eq!(frames[0].camera_from_world.to_wxyz(), [1.0, 0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&6u32.to_le_bytes());
        for v in [0.0f64; 7] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(b"x.png\0");
        bytes.extend_from_slice(&0u64.to_le_bytes());

        assert!(matches!(
            decode_frames_binary(&bytes),
            Err(ColmapError::InvalidQuaternion { frame_id: 6 })
        ));
    }
}
