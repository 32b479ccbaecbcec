use std::fmt::Write as _;

use splatprep_lie::se3::SE3;

use super::{ColmapError, ModelFiles, INVALID_POINT3D_ID};
use crate::camera::{Camera, CameraModel};
use crate::model::{Frame, Observation, Point3d, SparseModel, TrackElement};

/// Parse one whitespace separated field of a text line.
fn parse_part<T: std::str::FromStr>(s: &str, line: usize) -> Result<T, ColmapError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(|e| ColmapError::MalformedLine {
        line,
        reason: format!("{s}: {e}"),
    })
}

fn parse_parts<T: std::str::FromStr + Default + Copy, const N: usize>(
    parts: &[&str],
    line: usize,
) -> Result<[T; N], ColmapError>
where
    T::Err: std::fmt::Display,
{
    let mut values = [T::default(); N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = parse_part(part, line)?;
    }
    Ok(values)
}

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Split off the first `n` whitespace separated tokens and return the rest of the line.
///
/// The rest keeps its inner and trailing whitespace, so names with spaces survive.
fn split_leading_tokens(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut tokens = Vec::with_capacity(n);
    let mut rest = line;
    for _ in 0..n {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = &rest[end..];
    }
    // a single separator precedes the name
    let rest = rest.strip_prefix([' ', '\t']).unwrap_or(rest);
    Some((tokens, rest))
}

/// Parse a camera line.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str, line_number: usize) -> Result<Camera, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    if parts.len() < 4 {
        return Err(ColmapError::MalformedLine {
            line: line_number,
            reason: format!("expected at least 4 fields, found {}", parts.len()),
        });
    }

    let camera_id: u32 = parse_part(parts[0], line_number)?;
    let model = CameraModel::from_name(parts[1])?;
    let width = parse_part(parts[2], line_number)?;
    let height = parse_part(parts[3], line_number)?;

    let params = parts[4..]
        .iter()
        .map(|s| parse_part(s, line_number))
        .collect::<Result<Vec<f64>, _>>()?;
    if params.len() != model.num_params() {
        return Err(ColmapError::MalformedLine {
            line: line_number,
            reason: format!(
                "{model} expects {} parameters, found {}",
                model.num_params(),
                params.len()
            ),
        });
    }

    Camera::new(camera_id, model, width, height, params)
        .map_err(|source| ColmapError::InvalidCamera { camera_id, source })
}

// both "-1" and the binary sentinel mean "no point"
fn parse_point3d_id(s: &str, line: usize) -> Result<Option<u64>, ColmapError> {
    if s == "-1" {
        return Ok(None);
    }
    let id = parse_part::<u64>(s, line)?;
    Ok((id != INVALID_POINT3D_ID).then_some(id))
}

/// Parse the pose line and the observation line of a frame.
/// #   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
/// #   POINTS2D[] as (X, Y, POINT3D_ID)
fn parse_frame_lines(
    pose_line: &str,
    pose_line_number: usize,
    points_line: &str,
) -> Result<Frame, ColmapError> {
    let malformed = |line, reason: &str| ColmapError::MalformedLine {
        line,
        reason: reason.to_string(),
    };

    let (parts, name) = split_leading_tokens(pose_line, 9)
        .ok_or_else(|| malformed(pose_line_number, "expected 10 fields"))?;
    if name.is_empty() {
        return Err(malformed(pose_line_number, "missing frame name"));
    }

    let frame_id: u32 = parse_part(parts[0], pose_line_number)?;
    let wxyz: [f64; 4] = parse_parts(&parts[1..5], pose_line_number)?;
    let translation: [f64; 3] = parse_parts(&parts[5..8], pose_line_number)?;
    let camera_id = parse_part(parts[8], pose_line_number)?;

    let camera_from_world = SE3::from_wxyz_translation(wxyz, translation)
        .ok_or(ColmapError::InvalidQuaternion { frame_id })?;

    let points_line_number = pose_line_number + 1;
    let points = points_line.split_whitespace().collect::<Vec<_>>();
    if points.len() % 3 != 0 {
        return Err(malformed(
            points_line_number,
            "observations must come in (X, Y, POINT3D_ID) triplets",
        ));
    }
    let observations = points
        .chunks_exact(3)
        .map(|chunk| -> Result<Observation, ColmapError> {
            Ok(Observation {
                xy: [
                    parse_part(chunk[0], points_line_number)?,
                    parse_part(chunk[1], points_line_number)?,
                ],
                point3d_id: parse_point3d_id(chunk[2], points_line_number)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Frame {
        frame_id,
        camera_id,
        camera_from_world,
        name: name.to_string(),
        observations,
    })
}

/// Parse a point3d line.
///       POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[0], TRACK[1], ...
fn parse_point3d_line(line: &str, line_number: usize) -> Result<Point3d, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    if parts.len() < 8 || (parts.len() - 8) % 2 != 0 {
        return Err(ColmapError::MalformedLine {
            line: line_number,
            reason: format!("invalid number of fields: {}", parts.len()),
        });
    }

    Ok(Point3d {
        point3d_id: parse_part(parts[0], line_number)?,
        xyz: parse_parts(&parts[1..4], line_number)?,
        rgb: parse_parts(&parts[4..7], line_number)?,
        error: parse_part(parts[7], line_number)?,
        track: parts[8..]
            .chunks_exact(2)
            .map(|chunk| -> Result<TrackElement, ColmapError> {
                Ok(TrackElement {
                    frame_id: parse_part(chunk[0], line_number)?,
                    observation_index: parse_part(chunk[1], line_number)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Decode a `cameras.txt` document.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn decode_cameras_text(text: &str) -> Result<Vec<Camera>, ColmapError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !is_skipped(line))
        .map(|(idx, line)| parse_camera_line(line, idx + 1))
        .collect()
}

/// Decode an `images.txt` document.
///
/// Every frame spans two lines: the pose line and the observation line. The
/// observation line may be empty.
pub fn decode_frames_text(text: &str) -> Result<Vec<Frame>, ColmapError> {
    let mut frames = Vec::new();
    let mut lines = text.lines().enumerate();
    while let Some((idx, pose_line)) = lines.next() {
        if is_skipped(pose_line) {
            continue;
        }
        let points_line = lines.next().map(|(_, line)| line).unwrap_or("");
        frames.push(parse_frame_lines(pose_line, idx + 1, points_line)?);
    }
    Ok(frames)
}

/// Decode a `points3D.txt` document.
pub fn decode_points3d_text(text: &str) -> Result<Vec<Point3d>, ColmapError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !is_skipped(line))
        .map(|(idx, line)| parse_point3d_line(line, idx + 1))
        .collect()
}

/// Decode a complete text model.
pub fn decode_text(files: &ModelFiles<&str>) -> Result<SparseModel, ColmapError> {
    let model = SparseModel::new(
        decode_cameras_text(files.cameras)?,
        decode_frames_text(files.images)?,
        decode_points3d_text(files.points3d)?,
    );
    model.check_consistency()?;

    log::debug!(
        "decoded text model: {} cameras, {} frames, {} points",
        model.cameras.len(),
        model.frames.len(),
        model.points3d.len()
    );

    Ok(model)
}

fn write_camera_line(out: &mut String, camera: &Camera) {
    let _ = write!(
        out,
        "{} {} {} {}",
        camera.camera_id(),
        camera.model(),
        camera.width(),
        camera.height()
    );
    for param in camera.params() {
        let _ = write!(out, " {param}");
    }
}

/// Encode cameras as a `cameras.txt` document.
pub fn encode_cameras_text(cameras: &[Camera]) -> String {
    let mut out = String::new();
    out.push_str("# Camera list with one line of data per camera:\n");
    out.push_str("#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]\n");
    let _ = writeln!(out, "# Number of cameras: {}", cameras.len());
    for camera in cameras {
        write_camera_line(&mut out, camera);
        out.push('\n');
    }
    out
}

/// Encode frames as an `images.txt` document.
pub fn encode_frames_text(frames: &[Frame]) -> String {
    let mean_observations = if frames.is_empty() {
        0.0
    } else {
        frames.iter().map(|f| f.observations.len()).sum::<usize>() as f64 / frames.len() as f64
    };

    let mut out = String::new();
    out.push_str("# Image list with two lines of data per image:\n");
    out.push_str("#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME\n");
    out.push_str("#   POINTS2D[] as (X, Y, POINT3D_ID)\n");
    let _ = writeln!(
        out,
        "# Number of images: {}, mean observations per image: {}",
        frames.len(),
        mean_observations
    );

    for frame in frames {
        let [qw, qx, qy, qz] = frame.camera_from_world.to_wxyz();
        let t = frame.camera_from_world.translation;
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {} {} {} {}",
            frame.frame_id, qw, qx, qy, qz, t.x, t.y, t.z, frame.camera_id, frame.name
        );

        let mut first = true;
        for observation in &frame.observations {
            if !first {
                out.push(' ');
            }
            first = false;
            let _ = write!(out, "{} {} ", observation.xy[0], observation.xy[1]);
            match observation.point3d_id {
                Some(id) => {
                    let _ = write!(out, "{id}");
                }
                None => out.push_str("-1"),
            }
        }
        out.push('\n');
    }
    out
}

/// Encode points as a `points3D.txt` document.
pub fn encode_points3d_text(points: &[Point3d]) -> String {
    let mean_track_length = if points.is_empty() {
        0.0
    } else {
        points.iter().map(|p| p.track.len()).sum::<usize>() as f64 / points.len() as f64
    };

    let mut out = String::new();
    out.push_str("# 3D point list with one line of data per point:\n");
    out.push_str("#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)\n");
    let _ = writeln!(
        out,
        "# Number of points: {}, mean track length: {}",
        points.len(),
        mean_track_length
    );

    for point in points {
        let [x, y, z] = point.xyz;
        let [r, g, b] = point.rgb;
        let _ = write!(
            out,
            "{} {x} {y} {z} {r} {g} {b} {}",
            point.point3d_id, point.error
        );
        for element in &point.track {
            let _ = write!(out, " {} {}", element.frame_id, element.observation_index);
        }
        out.push('\n');
    }
    out
}

/// Encode a complete model into its three text documents.
pub fn encode_text(model: &SparseModel) -> ModelFiles<String> {
    ModelFiles {
        cameras: encode_cameras_text(&model.cameras),
        images: encode_frames_text(&model.frames),
        points3d: encode_points3d_text(&model.points3d),
    }
}

/// Rewrite every camera line of a `cameras.txt` document.
///
/// Comment lines, blank lines and line endings are copied through verbatim; only
/// the camera lines are replaced by the output of `f`.
///
/// # Arguments
///
/// * `text` - The content of a `cameras.txt` file.
/// * `f` - Called once per camera in file order.
///
/// # Returns
///
/// The rewritten document.
pub fn map_camera_lines<E, F>(text: &str, mut f: F) -> Result<String, E>
where
    E: From<ColmapError>,
    F: FnMut(Camera) -> Result<Camera, E>,
{
    let mut out = String::with_capacity(text.len());
    for (idx, chunk) in text.split_inclusive('\n').enumerate() {
        let content = chunk
            .strip_suffix('\n')
            .map(|c| c.strip_suffix('\r').unwrap_or(c))
            .unwrap_or(chunk);
        let ending = &chunk[content.len()..];

        if is_skipped(content) {
            out.push_str(chunk);
            continue;
        }

        let camera = parse_camera_line(content, idx + 1)?;
        let camera = f(camera)?;
        write_camera_line(&mut out, &camera);
        out.push_str(ending);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraModelError;
    use glam::DVec3;
    use splatprep_lie::so3::SO3;

    const CAMERAS_TXT: &str = "\
# Camera list with one line of data per camera:
#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
# Number of cameras: 2
1 PINHOLE 1600 1400 1000 1001 800 700

2 SIMPLE_RADIAL 640 480 500 320 240 0.01
";

    const IMAGES_TXT: &str = "\
# Image list with two lines of data per image:
#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
#   POINTS2D[] as (X, Y, POINT3D_ID)
# Number of images: 2, mean observations per image: 1
1 1 0 0 0 0.5 -0.5 2 1 2019A GP Left (1).png
10.5 20.25 7 3 4 -1
2 0.7071067811865476 0 0.7071067811865475 0 0 0 0 2 frame_0002.jpg

";

    const POINTS_TXT: &str = "\
# 3D point list with one line of data per point:
#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)
# Number of points: 1, mean track length: 1
7 0.5 -0.25 12 255 128 0 0.75 1 0
";

    #[test]
    fn test_decode_cameras() -> Result<(), ColmapError> {
        let cameras = decode_cameras_text(CAMERAS_TXT)?;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].model(), CameraModel::Pinhole);
        assert_eq!(cameras[0].params(), &[1000.0, 1001.0, 800.0, 700.0]);
        assert_eq!(cameras[1].model(), CameraModel::SimpleRadial);
        assert_eq!(cameras[1].width(), 640);
        Ok(())
    }

    #[test]
    fn test_decode_frames() -> Result<(), ColmapError> {
        let frames = decode_frames_text(IMAGES_TXT)?;
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].name, "2019A GP Left (1).png");
        assert_eq!(frames[0].camera_from_world.translation, DVec3::new(0.5, -0.5, 2.0));
        assert_eq!(
            frames[0].observations,
            vec![
                Observation {
                    xy: [10.5, 20.25],
                    point3d_id: Some(7)
                },
                Observation {
                    xy: [3.0, 4.0],
                    point3d_id: None
                },
            ]
        );

        assert_eq!(frames[1].name, "frame_0002.jpg");
        assert!(frames[1].observations.is_empty());
        assert_eq!(
            frames[1].camera_from_world.to_wxyz(),
            [0.7071067811865476, 0.0, 0.7071067811865475, 0.0]
        );
        Ok(())
    }

    #[test]
    fn test_decode_frames_missing_final_observation_line() -> Result<(), ColmapError> {
        let frames = decode_frames_text("1 1 0 0 0 0 0 0 1 last.png")?;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].observations.is_empty());
        Ok(())
    }

    #[test]
    fn test_decode_points() -> Result<(), ColmapError> {
        let points = decode_points3d_text(POINTS_TXT)?;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].rgb, [255, 128, 0]);
        assert_eq!(
            points[0].track,
            vec![TrackElement {
                frame_id: 1,
                observation_index: 0
            }]
        );
        Ok(())
    }

    #[test]
    fn test_text_roundtrip() -> Result<(), ColmapError> {
        let model = decode_text(&ModelFiles {
            cameras: CAMERAS_TXT,
            images: IMAGES_TXT,
            points3d: POINTS_TXT,
        })?;
        let encoded = encode_text(&model);
        let decoded = decode_text(&encoded.borrowed())?;
        assert_eq!(decoded, model);
        Ok(())
    }

    #[test]
    fn test_float_roundtrip_is_exact() -> Result<(), ColmapError> {
        let rotation = SO3::exp(DVec3::new(0.123456789, -1.0e-7, 2.5));
        let frame = Frame::new(
            3,
            1,
            SE3::new(rotation, DVec3::new(1.0 / 3.0, -2.0e-300, 1.0e15)),
            "a.png",
        );
        let text = encode_frames_text(std::slice::from_ref(&frame));
        let decoded = decode_frames_text(&text)?;
        assert_eq!(decoded[0], frame);
        Ok(())
    }

    #[test]
    fn test_unknown_model_name() {
        let res = decode_cameras_text("1 BROWN 640 480 1 2 3 4\n");
        assert!(matches!(
            res,
            Err(ColmapError::UnknownCameraModel(CameraModelError::UnknownName(name))) if name == "BROWN"
        ));
    }

    #[test]
    fn test_wrong_param_count() {
        let res = decode_cameras_text("# header\n1 PINHOLE 640 480 500 500 320\n");
        assert!(matches!(res, Err(ColmapError::MalformedLine { line: 2, .. })));
    }

    #[test]
    fn test_malformed_observations() {
        let res = decode_frames_text("1 1 0 0 0 0 0 0 1 a.png\n1.0 2.0\n");
        assert!(matches!(res, Err(ColmapError::MalformedLine { line: 2, .. })));
    }

    #[test]
    fn test_malformed_number() {
        let res = decode_points3d_text("7 0.5 x 12 255 128 0 0.75\n");
        assert!(matches!(res, Err(ColmapError::MalformedLine { line: 1, .. })));
    }

    #[test]
    fn test_crlf_line_endings() -> Result<(), ColmapError> {
        let frames = decode_frames_text("1 1 0 0 0 0 0 0 1 a b.png\r\n1 2 -1\r\n")?;
        assert_eq!(frames[0].name, "a b.png");
        assert_eq!(frames[0].observations.len(), 1);
        Ok(())
    }

    #[test]
    fn test_binary_sentinel_point_id_is_missing() -> Result<(), ColmapError> {
        let sentinel = decode_frames_text("1 1 0 0 0 0 0 0 1 a.png\n1 2 18446744073709551615\n")?;
        let minus_one = decode_frames_text("1 1 0 0 0 0 0 0 1 a.png\n1 2 -1\n")?;
        assert_eq!(sentinel[0].observations[0].point3d_id, None);
        assert_eq!(sentinel, minus_one);

        let binary = crate::io::colmap::encode_frames_binary(&sentinel);
        assert_eq!(crate::io::colmap::decode_frames_binary(&binary)?, sentinel);
        Ok(())
    }

    #[test]
    fn test_encode_invalid_point_as_minus_one() {
        let mut frame = Frame::new(1, 1, SE3::IDENTITY, "a.png");
        frame.observations.push(Observation {
            xy: [1.5, 2.0],
            point3d_id: None,
        });
        let text = encode_frames_text(&[frame]);
        let last_line = text.lines().last().unwrap();
        assert_eq!(last_line, "1.5 2 -1");
    }

    #[test]
    fn test_map_camera_lines_preserves_comments() -> Result<(), ColmapError> {
        let text = "# keep me\r\n1 PINHOLE 100 50 10 10 50 25\r\n\n# trailing";
        let out = map_camera_lines::<ColmapError, _>(text, |camera| {
            Ok(Camera::new(
                camera.camera_id(),
                camera.model(),
                camera.width() * 2,
                camera.height() * 2,
                camera.params().iter().map(|p| p * 2.0).collect(),
            )
            .unwrap())
        })?;
        assert_eq!(out, "# keep me\r\n1 PINHOLE 200 100 20 20 100 50\r\n\n# trailing");
        Ok(())
    }
}
