use argh::FromArgs;
use std::path::PathBuf;

use splatprep::k3d::io::colmap::{self, ModelFormat};
use splatprep::k3d::io::fs::OverwritePolicy;

fn parse_format(value: &str) -> Result<ModelFormat, String> {
    match value {
        "bin" | "binary" => Ok(ModelFormat::Binary),
        "txt" | "text" => Ok(ModelFormat::Text),
        _ => Err(format!("unknown model format {value}, expected bin or txt")),
    }
}

#[derive(FromArgs)]
/// Convert a sparse model directory between the binary and text encodings
struct Args {
    /// path to the input model directory
    #[argh(option, short = 'i')]
    input_path: PathBuf,

    /// path to the output model directory
    #[argh(option, short = 'o')]
    output_path: PathBuf,

    /// output format: bin or txt
    #[argh(option, from_str_fn(parse_format))]
    output_format: ModelFormat,

    /// replace existing output files
    #[argh(switch)]
    overwrite: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let (model, input_format) = colmap::read_model(&args.input_path)?;
    log::info!(
        "read {:?} model: {} cameras, {} frames, {} points",
        input_format,
        model.cameras.len(),
        model.frames.len(),
        model.points3d.len()
    );

    let policy = if args.overwrite {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::Abort
    };
    colmap::write_model(&args.output_path, &model, args.output_format, &policy)?;

    Ok(())
}
