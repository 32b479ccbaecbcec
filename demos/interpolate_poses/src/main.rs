use argh::FromArgs;
use std::path::PathBuf;

use splatprep::k3d::io::colmap::{self, ModelFormat};
use splatprep::k3d::io::keyframes;
use splatprep::k3d::sequence;
use splatprep::k3d::trajectory::{self, InterpolationOptions};

#[derive(FromArgs)]
/// Interpolate poses for every image of a capture from the keyframe poses
struct Args {
    /// sparse model directory holding the keyframe poses; every format present is rewritten in place
    #[argh(option)]
    sparse_path: PathBuf,

    /// keyframe mapping file written by the tracker
    #[argh(option)]
    mapping_path: PathBuf,

    /// directory with all original images of the capture
    #[argh(option)]
    images_path: PathBuf,

    /// directory receiving the keyframe-only model (default: <sparse_path>/keyframe_poses)
    #[argh(option)]
    backup_path: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let backup_dir = args
        .backup_path
        .unwrap_or_else(|| args.sparse_path.join("keyframe_poses"));
    // refuse early rather than after interpolating
    colmap::check_backup_free(&backup_dir, &ModelFormat::detect_all(&args.sparse_path))?;

    let (keyframe_model, format) = colmap::read_model(&args.sparse_path)?;
    let mapping = keyframes::read_keyframe_mapping(&args.mapping_path)?;
    let keyframe_names = keyframes::keyframe_names(&mapping);
    let images = sequence::list_image_sequence(&args.images_path)?;

    log::info!(
        "{} keyframe poses ({:?}), {} mapped keyframes, {} images",
        keyframe_model.frames.len(),
        format,
        keyframe_names.len(),
        images.len()
    );

    let dense = trajectory::densify_model(
        &keyframe_model,
        &keyframe_names,
        &images,
        &InterpolationOptions::default(),
    )?;

    let formats = colmap::rewrite_model(&args.sparse_path, &dense, &backup_dir)?;
    log::info!(
        "wrote {} poses as {:?}, keyframe poses kept in {}",
        dense.frames.len(),
        formats,
        backup_dir.display()
    );

    Ok(())
}
