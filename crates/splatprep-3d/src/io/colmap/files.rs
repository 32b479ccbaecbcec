use std::path::{Path, PathBuf};

use super::{
    decode_binary, decode_cameras_binary, decode_cameras_text, decode_frames_binary,
    decode_frames_text, decode_points3d_binary, decode_points3d_text, decode_text, encode_binary,
    encode_text, ColmapError, ModelFiles,
};
use crate::camera::Camera;
use crate::io::fs::{write_files, OverwritePolicy, WriteError};
use crate::model::{Frame, Point3d, SparseModel};

/// The on-disk encoding of a sparse model directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `cameras.bin`, `images.bin`, `points3D.bin`
    Binary,
    /// `cameras.txt`, `images.txt`, `points3D.txt`
    Text,
}

impl ModelFormat {
    /// The three file names of this format.
    pub fn file_names(&self) -> ModelFiles<&'static str> {
        match self {
            ModelFormat::Binary => ModelFiles {
                cameras: "cameras.bin",
                images: "images.bin",
                points3d: "points3D.bin",
            },
            ModelFormat::Text => ModelFiles {
                cameras: "cameras.txt",
                images: "images.txt",
                points3d: "points3D.txt",
            },
        }
    }

    /// The three file paths of this format inside `dir`.
    pub fn paths(&self, dir: impl AsRef<Path>) -> ModelFiles<PathBuf> {
        let dir = dir.as_ref();
        let names = self.file_names();
        ModelFiles {
            cameras: dir.join(names.cameras),
            images: dir.join(names.images),
            points3d: dir.join(names.points3d),
        }
    }

    /// Detect the format of a model directory from its camera file.
    ///
    /// The binary format wins when both are present.
    pub fn detect(dir: impl AsRef<Path>) -> Option<Self> {
        Self::detect_all(dir).into_iter().next()
    }

    /// Every format whose camera file is present in `dir`, binary first.
    pub fn detect_all(dir: impl AsRef<Path>) -> Vec<Self> {
        let dir = dir.as_ref();
        [ModelFormat::Binary, ModelFormat::Text]
            .into_iter()
            .filter(|format| dir.join(format.file_names().cameras).is_file())
            .collect()
    }
}

fn no_model_found(dir: &Path) -> ColmapError {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no cameras.bin or cameras.txt in {}", dir.display()),
    )
    .into()
}

/// Fail if `backup_dir` already holds a model in one of `formats`.
///
/// A backup is taken once; a second run must not replace it with files that were
/// already rewritten.
pub fn check_backup_free(
    backup_dir: impl AsRef<Path>,
    formats: &[ModelFormat],
) -> Result<(), ColmapError> {
    let backup_dir = backup_dir.as_ref();
    if let Some(existing) = formats
        .iter()
        .map(|format| format.paths(backup_dir).cameras)
        .find(|path| path.exists())
    {
        return Err(WriteError::AlreadyExists(existing).into());
    }
    Ok(())
}

/// Read the cameras.bin file and return a vector of cameras.
pub fn read_cameras_bin(path: impl AsRef<Path>) -> Result<Vec<Camera>, ColmapError> {
    decode_cameras_binary(&std::fs::read(path)?)
}

/// Read the images.bin file and return a vector of frames.
pub fn read_images_bin(path: impl AsRef<Path>) -> Result<Vec<Frame>, ColmapError> {
    decode_frames_binary(&std::fs::read(path)?)
}

/// Read the points3D.bin file and return a vector of points.
pub fn read_points3d_bin(path: impl AsRef<Path>) -> Result<Vec<Point3d>, ColmapError> {
    decode_points3d_binary(&std::fs::read(path)?)
}

/// Read the cameras.txt file and return a vector of cameras.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
///
/// # Returns
///
/// A vector of cameras in file order.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<Camera>, ColmapError> {
    decode_cameras_text(&std::fs::read_to_string(path)?)
}

/// Read the images.txt file and return a vector of frames.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<Frame>, ColmapError> {
    decode_frames_text(&std::fs::read_to_string(path)?)
}

/// Read the points3D.txt file and return a vector of points.
pub fn read_points3d_txt(path: impl AsRef<Path>) -> Result<Vec<Point3d>, ColmapError> {
    decode_points3d_text(&std::fs::read_to_string(path)?)
}

/// Read a binary model directory.
pub fn read_model_binary(dir: impl AsRef<Path>) -> Result<SparseModel, ColmapError> {
    let paths = ModelFormat::Binary.paths(dir);
    let files = ModelFiles {
        cameras: std::fs::read(&paths.cameras)?,
        images: std::fs::read(&paths.images)?,
        points3d: std::fs::read(&paths.points3d)?,
    };
    decode_binary(&files.borrowed())
}

/// Read a text model directory.
pub fn read_model_text(dir: impl AsRef<Path>) -> Result<SparseModel, ColmapError> {
    let paths = ModelFormat::Text.paths(dir);
    let files = ModelFiles {
        cameras: std::fs::read_to_string(&paths.cameras)?,
        images: std::fs::read_to_string(&paths.images)?,
        points3d: std::fs::read_to_string(&paths.points3d)?,
    };
    decode_text(&files.borrowed())
}

/// Read a model directory in whichever format it holds.
///
/// # Returns
///
/// The model and the detected format.
pub fn read_model(dir: impl AsRef<Path>) -> Result<(SparseModel, ModelFormat), ColmapError> {
    let dir = dir.as_ref();
    let format = ModelFormat::detect(dir).ok_or_else(|| no_model_found(dir))?;

    log::info!("reading {:?} model from {}", format, dir.display());

    let model = match format {
        ModelFormat::Binary => read_model_binary(dir)?,
        ModelFormat::Text => read_model_text(dir)?,
    };
    Ok((model, format))
}

/// Write a model directory in the given format.
///
/// The model is validated before anything touches the disk. The directory is
/// created if needed.
///
/// # Arguments
///
/// * `dir` - The output directory.
/// * `model` - The model to write.
/// * `format` - The output encoding.
/// * `policy` - What to do with files that already exist.
pub fn write_model(
    dir: impl AsRef<Path>,
    model: &SparseModel,
    format: ModelFormat,
    policy: &OverwritePolicy,
) -> Result<(), ColmapError> {
    let dir = dir.as_ref();
    model.check_consistency()?;

    let encoded: ModelFiles<Vec<u8>> = match format {
        ModelFormat::Binary => encode_binary(model),
        ModelFormat::Text => {
            let text = encode_text(model);
            ModelFiles {
                cameras: text.cameras.into_bytes(),
                images: text.images.into_bytes(),
                points3d: text.points3d.into_bytes(),
            }
        }
    };

    std::fs::create_dir_all(dir)?;
    let paths = format.paths(dir);
    write_files(
        &[
            (paths.cameras, encoded.cameras),
            (paths.images, encoded.images),
            (paths.points3d, encoded.points3d),
        ],
        policy,
    )?;

    log::info!(
        "wrote {:?} model to {}: {} cameras, {} frames, {} points",
        format,
        dir.display(),
        model.cameras.len(),
        model.frames.len(),
        model.points3d.len()
    );

    Ok(())
}

/// Replace a model directory in every format it holds.
///
/// The files being replaced are copied into `backup_dir` first. Nothing is written
/// if `backup_dir` already holds a model.
///
/// # Arguments
///
/// * `dir` - A directory holding a model in one or both formats.
/// * `model` - The replacement model.
/// * `backup_dir` - Directory receiving the previous files.
///
/// # Returns
///
/// The formats that were rewritten.
pub fn rewrite_model(
    dir: impl AsRef<Path>,
    model: &SparseModel,
    backup_dir: impl AsRef<Path>,
) -> Result<Vec<ModelFormat>, ColmapError> {
    let dir = dir.as_ref();
    let formats = ModelFormat::detect_all(dir);
    if formats.is_empty() {
        return Err(no_model_found(dir));
    }
    check_backup_free(&backup_dir, &formats)?;
    model.check_consistency()?;

    let policy = OverwritePolicy::BackupThenOverwrite {
        backup_dir: backup_dir.as_ref().to_path_buf(),
    };
    for format in &formats {
        write_model(dir, model, *format, &policy)?;
    }
    Ok(formats)
}
