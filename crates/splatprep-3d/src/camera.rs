use std::fmt;
use std::str::FromStr;

/// Error returned when a camera model cannot be resolved from the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraModelError {
    /// The numeric model id is not one of the known models.
    #[error("Unknown camera model id: {0}")]
    UnknownId(i32),

    /// The model name is not one of the known models.
    #[error("Unknown camera model name: {0}")]
    UnknownName(String),
}

/// Error types for camera construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    /// The camera model could not be resolved.
    #[error(transparent)]
    UnknownModel(#[from] CameraModelError),

    /// The parameter vector does not match the arity of the camera model.
    #[error("Camera model {model} expects {expected} parameters, got {actual}")]
    InvalidNumParams {
        /// The camera model.
        model: CameraModel,
        /// The number of parameters the model defines.
        expected: usize,
        /// The number of parameters provided.
        actual: usize,
    },

    /// Width or height is zero.
    #[error("Invalid camera size {width}x{height}")]
    InvalidSize {
        /// Image width in pixels.
        width: u64,
        /// Image height in pixels.
        height: u64,
    },
}

/// The meaning of a single intrinsic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Focal length shared by both axes.
    Focal,
    /// Focal length along x.
    FocalX,
    /// Focal length along y.
    FocalY,
    /// Principal point x coordinate.
    PrincipalX,
    /// Principal point y coordinate.
    PrincipalY,
    /// A distortion coefficient, defined in normalized image coordinates.
    Distortion,
}

use ParamRole::{Distortion as D, Focal as F, FocalX as FX, FocalY as FY};
use ParamRole::{PrincipalX as CX, PrincipalY as CY};

const SINGLE_FOCAL_1: [ParamRole; 4] = [F, CX, CY, D];
const SINGLE_FOCAL_2: [ParamRole; 5] = [F, CX, CY, D, D];
const SPLIT_FOCAL_4: [ParamRole; 8] = [FX, FY, CX, CY, D, D, D, D];
const SPLIT_FOCAL_8: [ParamRole; 12] = [FX, FY, CX, CY, D, D, D, D, D, D, D, D];

/// The camera models of the sparse model format.
///
/// The discriminant is the model id stored on disk. The number and meaning of the
/// parameters are fixed per model and never stored alongside the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraModel {
    /// f, cx, cy
    SimplePinhole = 0,
    /// fx, fy, cx, cy
    Pinhole = 1,
    /// f, cx, cy, k
    SimpleRadial = 2,
    /// f, cx, cy, k1, k2
    Radial = 3,
    /// fx, fy, cx, cy, k1, k2, p1, p2
    OpenCV = 4,
    /// fx, fy, cx, cy, k1, k2, k3, k4
    OpenCVFisheye = 5,
    /// fx, fy, cx, cy, k1, k2, p1, p2, k3, k4, k5, k6
    FullOpenCV = 6,
    /// fx, fy, cx, cy, omega
    Fov = 7,
    /// f, cx, cy, k
    SimpleRadialFisheye = 8,
    /// f, cx, cy, k1, k2
    RadialFisheye = 9,
    /// fx, fy, cx, cy, k1, k2, p1, p2, k3, k4, sx1, sy1
    ThinPrismFisheye = 10,
}

impl CameraModel {
    /// All known camera models ordered by id.
    pub const ALL: [CameraModel; 11] = [
        CameraModel::SimplePinhole,
        CameraModel::Pinhole,
        CameraModel::SimpleRadial,
        CameraModel::Radial,
        CameraModel::OpenCV,
        CameraModel::OpenCVFisheye,
        CameraModel::FullOpenCV,
        CameraModel::Fov,
        CameraModel::SimpleRadialFisheye,
        CameraModel::RadialFisheye,
        CameraModel::ThinPrismFisheye,
    ];

    /// Resolve a model from its on-disk id.
    pub fn from_id(model_id: i32) -> Result<Self, CameraModelError> {
        Self::ALL
            .iter()
            .copied()
            .find(|model| model.id() == model_id)
            .ok_or(CameraModelError::UnknownId(model_id))
    }

    /// Resolve a model from its canonical upper-case name, e.g. `OPENCV`.
    pub fn from_name(name: &str) -> Result<Self, CameraModelError> {
        Self::ALL
            .iter()
            .copied()
            .find(|model| model.name() == name)
            .ok_or_else(|| CameraModelError::UnknownName(name.to_string()))
    }

    /// The on-disk model id.
    pub const fn id(&self) -> i32 {
        *self as i32
    }

    /// The canonical model name.
    pub const fn name(&self) -> &'static str {
        match self {
            CameraModel::SimplePinhole => "SIMPLE_PINHOLE",
            CameraModel::Pinhole => "PINHOLE",
            CameraModel::SimpleRadial => "SIMPLE_RADIAL",
            CameraModel::Radial => "RADIAL",
            CameraModel::OpenCV => "OPENCV",
            CameraModel::OpenCVFisheye => "OPENCV_FISHEYE",
            CameraModel::FullOpenCV => "FULL_OPENCV",
            CameraModel::Fov => "FOV",
            CameraModel::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            CameraModel::RadialFisheye => "RADIAL_FISHEYE",
            CameraModel::ThinPrismFisheye => "THIN_PRISM_FISHEYE",
        }
    }

    /// The ordered roles of the model parameters.
    pub const fn param_roles(&self) -> &'static [ParamRole] {
        match self {
            CameraModel::SimplePinhole => &[F, CX, CY],
            CameraModel::Pinhole => &[FX, FY, CX, CY],
            CameraModel::SimpleRadial | CameraModel::SimpleRadialFisheye => &SINGLE_FOCAL_1,
            CameraModel::Radial | CameraModel::RadialFisheye => &SINGLE_FOCAL_2,
            CameraModel::OpenCV | CameraModel::OpenCVFisheye => &SPLIT_FOCAL_4,
            CameraModel::FullOpenCV | CameraModel::ThinPrismFisheye => &SPLIT_FOCAL_8,
            CameraModel::Fov => &[FX, FY, CX, CY, D],
        }
    }

    /// The number of parameters, implied by the model.
    pub const fn num_params(&self) -> usize {
        self.param_roles().len()
    }

    /// Whether the model has a single focal length shared by both axes.
    pub fn has_shared_focal(&self) -> bool {
        self.param_roles().contains(&ParamRole::Focal)
    }

    /// The index of the first parameter with the given role.
    pub fn param_index(&self, role: ParamRole) -> Option<usize> {
        self.param_roles().iter().position(|r| *r == role)
    }
}

impl fmt::Display for CameraModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CameraModel {
    type Err = CameraModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<i32> for CameraModel {
    type Error = CameraModelError;

    fn try_from(model_id: i32) -> Result<Self, Self::Error> {
        Self::from_id(model_id)
    }
}

/// Look up a camera model by its on-disk id.
pub fn lookup(model_id: i32) -> Result<CameraModel, CameraModelError> {
    CameraModel::from_id(model_id)
}

/// Look up a camera model by its canonical name.
pub fn lookup_by_name(name: &str) -> Result<CameraModel, CameraModelError> {
    CameraModel::from_name(name)
}

/// A camera with a model, an image size and model parameters.
///
/// The parameter count always matches the model arity; the fields are only reachable
/// through constructors that check it.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    camera_id: u32,
    model: CameraModel,
    width: u64,
    height: u64,
    params: Vec<f64>,
}

impl Camera {
    /// Create a new camera, validating the image size and the parameter count.
    pub fn new(
        camera_id: u32,
        model: CameraModel,
        width: u64,
        height: u64,
        params: Vec<f64>,
    ) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidSize { width, height });
        }
        if params.len() != model.num_params() {
            return Err(CameraError::InvalidNumParams {
                model,
                expected: model.num_params(),
                actual: params.len(),
            });
        }
        Ok(Self {
            camera_id,
            model,
            width,
            height,
            params,
        })
    }

    /// The camera id.
    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    /// The camera model.
    pub fn model(&self) -> CameraModel {
        self.model
    }

    /// Image width in pixels.
    pub fn width(&self) -> u64 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// The model parameters.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// The parameter with the given role, if the model has one.
    pub fn param(&self, role: ParamRole) -> Option<f64> {
        self.model.param_index(role).map(|i| self.params[i])
    }

    /// The distortion coefficients in model order.
    pub fn distortion(&self) -> Vec<f64> {
        self.model
            .param_roles()
            .iter()
            .zip(self.params.iter())
            .filter(|(role, _)| **role == ParamRole::Distortion)
            .map(|(_, p)| *p)
            .collect()
    }

    /// The same camera with a different id.
    pub fn with_camera_id(mut self, camera_id: u32) -> Self {
        self.camera_id = camera_id;
        self
    }
}
