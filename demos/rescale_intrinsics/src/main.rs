use argh::FromArgs;
use std::path::PathBuf;

use splatprep::k3d::camera::Camera;
use splatprep::k3d::io::calibration::{self, CalibrationDocument};
use splatprep::k3d::io::colmap::{self, ModelFormat};
use splatprep::k3d::io::fs::{self, OverwritePolicy};
use splatprep::k3d::rescale::{self, RescaleError};

#[derive(FromArgs)]
/// Rescale camera intrinsics to a new image resolution
struct Args {
    /// sparse model directory whose cameras are rescaled in place, in every format present
    #[argh(option)]
    model_path: Option<PathBuf>,

    /// calibration document (.yaml, or .json) to rescale instead of a model
    #[argh(option)]
    calibration_path: Option<PathBuf>,

    /// output path for the rescaled calibration document
    #[argh(option, short = 'o')]
    output_path: Option<PathBuf>,

    /// target image width in pixels
    #[argh(option)]
    width: u64,

    /// target image height in pixels
    #[argh(option)]
    height: u64,

    /// drop distortion and write PINHOLE cameras, for undistorted images
    #[argh(switch)]
    pinhole: bool,
}

fn rescale_for_output(camera: &Camera, args: &Args) -> Result<Camera, RescaleError> {
    let camera = rescale::rescale_camera(camera, args.width, args.height)?;
    if args.pinhole {
        camera.to_pinhole()
    } else {
        Ok(camera)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    if let Some(calibration_path) = &args.calibration_path {
        let document = calibration::read_calibration(calibration_path)?;
        let camera = rescale_for_output(&document.to_camera(1)?, &args)?;
        let output = CalibrationDocument::from_camera(&camera);

        let output_path = args
            .output_path
            .clone()
            .unwrap_or_else(|| calibration_path.clone());
        fs::backup_file(&output_path, &output_path.with_file_name("original_intrinsics"))?;
        calibration::write_calibration(&output_path, &output)?;
        log::info!("wrote {}", output_path.display());
        return Ok(());
    }

    let Some(model_path) = &args.model_path else {
        return Err("either --model-path or --calibration-path is required".into());
    };
    let formats = ModelFormat::detect_all(model_path);
    if formats.is_empty() {
        return Err(format!("no sparse model found in {}", model_path.display()).into());
    }
    let backup_dir = model_path.join("original_intrinsics");
    colmap::check_backup_free(&backup_dir, &formats)?;
    let policy = OverwritePolicy::BackupThenOverwrite { backup_dir };

    for format in formats {
        match format {
            ModelFormat::Text => {
                // rewrite only the camera lines so comments survive
                let path = ModelFormat::Text.paths(model_path).cameras;
                let text = std::fs::read_to_string(&path)?;
                let rescaled =
                    colmap::map_camera_lines(&text, |camera| rescale_for_output(&camera, &args))?;
                fs::write_files(&[(&path, rescaled)], &policy)?;
                log::info!("rescaled {}", path.display());
            }
            ModelFormat::Binary => {
                let mut model = colmap::read_model_binary(model_path)?;
                model.cameras = model
                    .cameras
                    .iter()
                    .map(|camera| rescale_for_output(camera, &args))
                    .collect::<Result<Vec<_>, _>>()?;
                colmap::write_model(model_path, &model, ModelFormat::Binary, &policy)?;
            }
        }
    }

    Ok(())
}
