use clap::Parser;
use std::path::PathBuf;

use ei2gst::pipeline::{self, ConvertOptions};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Binary artifacts, descriptors and anchors
    All,
    /// Stop after reading all inputs and print the variable table as JSON
    Vars,
    /// Full conversion, then print input and artifact digests as JSON
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "ei2gst",
    version,
    about = "EdgeImpulse DRP-AI deployment to GStreamer DRP-AI plugin translator"
)]
struct Cli {
    /// The folder and prefix of files to create
    model_name: String,

    /// Directory containing `tflite-model/` and `model-parameters/`
    #[arg(short = 'C', long, default_value = ".")]
    working_dir: PathBuf,

    /// Treat skipped header lines as errors
    #[arg(long)]
    strict: bool,

    /// Read the address map from this file instead of the extracted one
    #[arg(long)]
    address_map: Option<PathBuf>,

    /// JSON tensor dump of the model, used to recover YOLO anchors
    #[arg(long)]
    tensors: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::All)]
    emit: EmitStage,

    /// Print stage timing and per-symbol details
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let options = ConvertOptions {
        model_name: cli.model_name,
        working_dir: cli.working_dir,
        strict: cli.strict,
        address_map: cli.address_map,
        tensors: cli.tensors,
    };

    // ── Output directory ──
    let output_dir = options.output_dir();
    log::info!("Creating folder: {}", output_dir.display());
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("ei2gst: error: {}: {}", output_dir.display(), e);
        std::process::exit(2);
    }

    // ── Conversion ──
    let result = match cli.emit {
        EmitStage::Vars => {
            pipeline::read_all(options).map(|conversion| print_json(conversion.table()))
        }
        EmitStage::All => pipeline::run(options).map(|(conversion, outputs)| {
            log::info!(
                "wrote {} artifacts, {} descriptors{}",
                conversion.artifacts().len(),
                outputs.descriptors.len(),
                if outputs.anchors.is_some() { ", anchors" } else { "" }
            );
        }),
        EmitStage::BuildInfo => pipeline::run(options)
            .and_then(|(conversion, _)| conversion.build_info())
            .map(|info| print_json(&info)),
    };

    if let Err(e) = result {
        eprintln!("ei2gst: error: {}", e);
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("ei2gst: error: cannot serialize output: {}", e);
            std::process::exit(1);
        }
    }
}
