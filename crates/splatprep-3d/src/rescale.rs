use crate::camera::{Camera, CameraError, CameraModel, ParamRole};
use crate::io::colmap::{map_camera_lines, ColmapError};
use crate::model::SparseModel;

/// Error types for intrinsics rescaling.
#[derive(Debug, thiserror::Error)]
pub enum RescaleError {
    /// The parameter roles of the model are not grouped as focal, principal point, distortion
    #[error("Unsupported camera model for rescaling: {0}")]
    UnsupportedModel(CameraModel),

    /// The target resolution has a zero dimension
    #[error("Invalid target resolution {width}x{height}")]
    InvalidResolution {
        /// Target width in pixels.
        width: u64,
        /// Target height in pixels.
        height: u64,
    },

    /// The rescaled parameters do not form a valid camera
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Error decoding a camera file
    #[error(transparent)]
    Colmap(#[from] ColmapError),
}

/// Whether the roles are focal length(s), then the principal point, then distortion.
fn has_standard_grouping(model: CameraModel) -> bool {
    use ParamRole::*;

    let roles = model.param_roles();
    let focal_len = match roles {
        [Focal, ..] => 1,
        [FocalX, FocalY, ..] => 2,
        _ => return false,
    };
    matches!(roles.get(focal_len..focal_len + 2), Some([PrincipalX, PrincipalY]))
        && roles[focal_len + 2..].iter().all(|r| *r == Distortion)
}

/// Rescale a camera to a new image resolution.
///
/// Focal lengths and principal point are multiplied by `target / current` along
/// their axis; a focal length shared by both axes uses the mean of the two factors.
/// Distortion coefficients are copied unchanged. The input camera is not modified.
///
/// # Arguments
///
/// * `camera` - The camera to rescale.
/// * `target_width` - The new image width in pixels.
/// * `target_height` - The new image height in pixels.
///
/// # Returns
///
/// A new camera with the same id and model at the target resolution.
///
/// # Example
///
/// ```
/// use splatprep_3d::camera::{Camera, CameraModel};
/// use splatprep_3d::rescale::rescale_camera;
///
/// let camera = Camera::new(1, CameraModel::Pinhole, 100, 50, vec![80.0, 80.0, 50.0, 25.0]).unwrap();
/// let scaled = rescale_camera(&camera, 200, 100).unwrap();
/// assert_eq!(scaled.params(), &[160.0, 160.0, 100.0, 50.0]);
/// ```
pub fn rescale_camera(
    camera: &Camera,
    target_width: u64,
    target_height: u64,
) -> Result<Camera, RescaleError> {
    if target_width == 0 || target_height == 0 {
        return Err(RescaleError::InvalidResolution {
            width: target_width,
            height: target_height,
        });
    }
    let model = camera.model();
    if !has_standard_grouping(model) {
        return Err(RescaleError::UnsupportedModel(model));
    }

    let scale_x = target_width as f64 / camera.width() as f64;
    let scale_y = target_height as f64 / camera.height() as f64;

    let params = model
        .param_roles()
        .iter()
        .zip(camera.params())
        .map(|(role, p)| match role {
            ParamRole::Focal => p * (scale_x + scale_y) / 2.0,
            ParamRole::FocalX | ParamRole::PrincipalX => p * scale_x,
            ParamRole::FocalY | ParamRole::PrincipalY => p * scale_y,
            ParamRole::Distortion => *p,
        })
        .collect();

    log::debug!(
        "camera {}: {}x{} -> {}x{} (scale {:.6}, {:.6})",
        camera.camera_id(),
        camera.width(),
        camera.height(),
        target_width,
        target_height,
        scale_x,
        scale_y
    );

    Ok(Camera::new(
        camera.camera_id(),
        model,
        target_width,
        target_height,
        params,
    )?)
}

impl Camera {
    /// The pinhole part of this camera, with distortion dropped.
    ///
    /// Used once images are undistorted. A shared focal length is used for both
    /// axes; id and size are kept.
    pub fn to_pinhole(&self) -> Result<Camera, RescaleError> {
        let focal = self.param(ParamRole::Focal);
        let roles = [
            focal.or_else(|| self.param(ParamRole::FocalX)),
            focal.or_else(|| self.param(ParamRole::FocalY)),
            self.param(ParamRole::PrincipalX),
            self.param(ParamRole::PrincipalY),
        ];
        let params = roles
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or(RescaleError::UnsupportedModel(self.model()))?;

        Ok(Camera::new(
            self.camera_id(),
            CameraModel::Pinhole,
            self.width(),
            self.height(),
            params,
        )?)
    }
}

/// Rescale every camera of a model; frames and points are copied unchanged.
pub fn rescale_model(
    model: &SparseModel,
    target_width: u64,
    target_height: u64,
) -> Result<SparseModel, RescaleError> {
    let cameras = model
        .cameras
        .iter()
        .map(|camera| rescale_camera(camera, target_width, target_height))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "rescaled {} cameras to {}x{}",
        cameras.len(),
        target_width,
        target_height
    );

    Ok(SparseModel {
        cameras,
        frames: model.frames.clone(),
        points3d: model.points3d.clone(),
    })
}

/// Rescale the cameras of a `cameras.txt` document in place.
///
/// Comment and blank lines are copied verbatim.
pub fn rescale_cameras_text(
    text: &str,
    target_width: u64,
    target_height: u64,
) -> Result<String, RescaleError> {
    map_camera_lines(text, |camera| {
        rescale_camera(&camera, target_width, target_height)
    })
}
