use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraError, CameraModel, CameraModelError, ParamRole};

/// Distortion coefficients at or below this magnitude are treated as absent.
const DISTORTION_EPSILON: f64 = 1e-6;

/// Error types for the calibration reader.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The document is not valid JSON or misses a field
    #[error("Failed to parse JSON calibration document. {0}")]
    JsonError(#[from] serde_json::Error),

    /// The document is not valid YAML or misses a field
    #[error("Failed to parse YAML calibration document. {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The model name is not known
    #[error(transparent)]
    UnknownCameraModel(#[from] CameraModelError),

    /// No model name is given and the value count does not imply one
    #[error("Cannot infer a camera model from {0} calibration values")]
    MissingModel(usize),

    /// The values do not form a valid camera
    #[error(transparent)]
    InvalidCamera(#[from] CameraError),
}

/// The encoding of a calibration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationFormat {
    /// Block style YAML, as read by the tracker.
    Yaml,
    /// Pretty printed JSON.
    Json,
}

impl CalibrationFormat {
    /// Pick the format from the file extension; anything but `.json` is YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CalibrationFormat::Json,
            _ => CalibrationFormat::Yaml,
        }
    }
}

/// Intrinsics as written by the calibration step and read by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    /// Image width in pixels.
    pub width: u64,
    /// Image height in pixels.
    pub height: u64,
    /// `[fx, fy, cx, cy, distortion...]`, in the parameter order of the model.
    pub calibration: Vec<f64>,
    /// Camera model name. Inferred from the value count when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CalibrationDocument {
    /// Parse a JSON calibration document.
    pub fn from_json_str(s: &str) -> Result<Self, CalibrationError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to pretty printed JSON.
    pub fn to_json_string(&self) -> Result<String, CalibrationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a YAML calibration document.
    pub fn from_yaml_str(s: &str) -> Result<Self, CalibrationError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Serialize to block style YAML.
    pub fn to_yaml_string(&self) -> Result<String, CalibrationError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a document in the given format.
    pub fn parse(s: &str, format: CalibrationFormat) -> Result<Self, CalibrationError> {
        match format {
            CalibrationFormat::Yaml => Self::from_yaml_str(s),
            CalibrationFormat::Json => Self::from_json_str(s),
        }
    }

    /// Serialize in the given format.
    pub fn to_string_as(&self, format: CalibrationFormat) -> Result<String, CalibrationError> {
        match format {
            CalibrationFormat::Yaml => self.to_yaml_string(),
            CalibrationFormat::Json => self.to_json_string(),
        }
    }

    /// The camera model of the document.
    ///
    /// Without an explicit name, 4 values mean `PINHOLE` and 8 values mean `OPENCV`.
    pub fn camera_model(&self) -> Result<CameraModel, CalibrationError> {
        match (&self.model, self.calibration.len()) {
            (Some(name), _) => Ok(CameraModel::from_name(name)?),
            (None, 4) => Ok(CameraModel::Pinhole),
            (None, 8) => Ok(CameraModel::OpenCV),
            (None, n) => Err(CalibrationError::MissingModel(n)),
        }
    }

    /// Build a camera with the given id.
    pub fn to_camera(&self, camera_id: u32) -> Result<Camera, CalibrationError> {
        let model = self.camera_model()?;
        Ok(Camera::new(
            camera_id,
            model,
            self.width,
            self.height,
            self.calibration.clone(),
        )?)
    }

    /// Describe a camera for the tracker.
    ///
    /// Focal lengths and principal point come first as `[fx, fy, cx, cy]`. The
    /// distortion coefficients follow only if one of them is not negligible, in
    /// which case the model name is kept; otherwise the document is `PINHOLE`.
    pub fn from_camera(camera: &Camera) -> Self {
        let focal = camera.param(ParamRole::Focal);
        let fx = focal.or_else(|| camera.param(ParamRole::FocalX));
        let fy = focal.or_else(|| camera.param(ParamRole::FocalY));
        let cx = camera.param(ParamRole::PrincipalX);
        let cy = camera.param(ParamRole::PrincipalY);
        let mut calibration = [fx, fy, cx, cy]
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect::<Vec<_>>();

        let distortion = camera.distortion();
        let has_distortion = distortion.iter().any(|d| d.abs() > DISTORTION_EPSILON);

        let model = if has_distortion && !camera.model().has_shared_focal() {
            calibration.extend_from_slice(&distortion);
            camera.model()
        } else {
            if has_distortion {
                log::warn!(
                    "dropping distortion of {} camera {}: single focal models have no [fx, fy, cx, cy] layout",
                    camera.model(),
                    camera.camera_id()
                );
            }
            CameraModel::Pinhole
        };

        Self {
            width: camera.width(),
            height: camera.height(),
            calibration,
            model: Some(model.name().to_string()),
        }
    }
}

/// Read a calibration document.
///
/// The format follows the file extension, see [`CalibrationFormat::from_path`].
///
/// # Arguments
///
/// * `path` - The path to the calibration file, usually `intrinsics.yaml`.
pub fn read_calibration(path: impl AsRef<Path>) -> Result<CalibrationDocument, CalibrationError> {
    let path = path.as_ref();
    let format = CalibrationFormat::from_path(path);
    let document = CalibrationDocument::parse(&std::fs::read_to_string(path)?, format)?;
    log::debug!("read {:?} calibration from {}", format, path.display());
    Ok(document)
}

/// Write a calibration document in the format of the file extension.
pub fn write_calibration(
    path: impl AsRef<Path>,
    document: &CalibrationDocument,
) -> Result<(), CalibrationError> {
    let path = path.as_ref();
    std::fs::write(path, document.to_string_as(CalibrationFormat::from_path(path))?)?;
    Ok(())
}
