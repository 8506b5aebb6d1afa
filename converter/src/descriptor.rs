// descriptor.rs — Text descriptors for the GStreamer DRP-AI plugin
//
// Four independent emitters project the finished table into plugin files.
// Each `render_*` function is pure and returns the file contents; `write_*`
// wrappers put them on disk. A required key that is absent or still unset
// fails the descriptor with `MissingField`.

use std::path::{Path, PathBuf};

use log::info;

use crate::bind::NMS_IOU_KEY;
use crate::error::ConvertError;
use crate::table::VariableTable;

pub const CHANNELS_KEY: &str = "ei_dsp_config_image_t_channels";
pub const INPUT_ADDRESS_KEY: &str = "data_in_address";
pub const INPUT_WIDTH_KEY: &str = "EI_CLASSIFIER_INPUT_WIDTH";
pub const INPUT_HEIGHT_KEY: &str = "EI_CLASSIFIER_INPUT_HEIGHT";
pub const LABELS_KEY: &str = "ei_classifier_inferencing_categories";
pub const LABEL_COUNT_KEY: &str = "EI_CLASSIFIER_LABEL_COUNT";
pub const GRID_PREFIX: &str = "NUM_GRID_";
pub const CLASSIFICATION_KEY: &str = "EI_CLASSIFIER_OBJECT_DETECTION_LAST_LAYER";

/// Descriptor files, named `<model>_<suffix>` in the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    InputMap,
    Labels,
    OutputMap,
    PostProcess,
}

impl DescriptorKind {
    pub fn name(self) -> &'static str {
        match self {
            DescriptorKind::InputMap => "input map",
            DescriptorKind::Labels => "labels",
            DescriptorKind::OutputMap => "output map",
            DescriptorKind::PostProcess => "post-process parameters",
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            DescriptorKind::InputMap => "data_in_list.txt",
            DescriptorKind::Labels => "labels.txt",
            DescriptorKind::OutputMap => "data_out_list.txt",
            DescriptorKind::PostProcess => "post_process_params.txt",
        }
    }

    pub fn path(self, output_dir: &Path, model_name: &str) -> PathBuf {
        output_dir.join(format!("{}_{}", model_name, self.file_suffix()))
    }
}

// ── Input map ──────────────────────────────────────────────────────────────

pub fn render_input_map(table: &VariableTable) -> Result<String, ConvertError> {
    let d = DescriptorKind::InputMap.name();
    let channels = table.scalar(d, CHANNELS_KEY)?.to_lowercase();
    let address = table.scalar(d, INPUT_ADDRESS_KEY)?;
    let width = table.scalar(d, INPUT_WIDTH_KEY)?;
    let height = table.scalar(d, INPUT_HEIGHT_KEY)?;

    Ok(format!(
        "Input_node_name: {channels}_data\n\
         \x20        Address: 0x{address}\n\
         \x20        Channel: {count}\n\
         \x20        Width  : {width}\n\
         \x20        Height : {height}",
        count = channels.chars().count(),
    ))
}

// ── Labels ─────────────────────────────────────────────────────────────────

pub fn render_labels(table: &VariableTable) -> Result<String, ConvertError> {
    let d = DescriptorKind::Labels.name();
    let labels = table.string_list(d, LABELS_KEY)?;
    let expected = table.count(d, LABEL_COUNT_KEY)?;
    if labels.len() != expected {
        return Err(ConvertError::LabelCountMismatch {
            expected,
            found: labels.len(),
        });
    }
    Ok(labels.join("\n"))
}

// ── Output map ─────────────────────────────────────────────────────────────

pub fn render_output_map(table: &VariableTable) -> Result<String, ConvertError> {
    let d = DescriptorKind::OutputMap.name();
    let grids: Vec<&str> = table.keys_with_prefix(GRID_PREFIX).collect();
    if grids.is_empty() {
        return Err(ConvertError::NoOutputGrids);
    }

    let mut out = String::new();
    for key in grids {
        let size = table.scalar(d, key)?;
        out.push_str(&format!(
            "Output_node_name: {key}\n\
             \x20        Address: 0\n\
             \x20        Channel: 0\n\
             \x20        Width  : {size}\n\
             \x20        Height : {size}\n"
        ));
    }
    Ok(out)
}

// ── Post-process parameters ────────────────────────────────────────────────

/// Model families the classification scalar can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    YoloV5,
    Fomo,
}

impl ModelFamily {
    /// Case-insensitive substring match on the classification scalar.
    pub fn detect(classification: &str) -> Option<Self> {
        let lower = classification.to_lowercase();
        if lower.contains("yolov5") {
            Some(ModelFamily::YoloV5)
        } else if lower.contains("fomo") {
            Some(ModelFamily::Fomo)
        } else {
            None
        }
    }
}

/// Post-processing settings chosen for a classification.
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcess {
    pub classification: String,
    pub library: &'static str,
    pub version: &'static str,
    pub iou_threshold: String,
}

impl PostProcess {
    /// Classifications whose plugin needs the anchors file.
    pub fn needs_anchors(&self) -> bool {
        self.classification.to_lowercase().contains("yolo")
    }

    pub fn render(&self) -> String {
        format!(
            "[dynamic_library]\n{}\n\n[yolo_version]\n{}\n\n[iou_threshold]\n{}",
            self.library, self.version, self.iou_threshold
        )
    }
}

pub fn post_process(table: &VariableTable) -> Result<PostProcess, ConvertError> {
    let d = DescriptorKind::PostProcess.name();
    let classification = table.scalar(d, CLASSIFICATION_KEY)?;

    match ModelFamily::detect(classification) {
        Some(ModelFamily::YoloV5) => {
            let raw = table.scalar(d, NMS_IOU_KEY)?;
            let iou = raw.strip_suffix('f').unwrap_or(raw);
            let valid = iou.parse::<f64>().is_ok_and(|v| v >= 0.0);
            if !valid {
                return Err(ConvertError::InvalidField {
                    key: NMS_IOU_KEY.to_string(),
                    value: raw.to_string(),
                    reason: "expected a non-negative IoU threshold".to_string(),
                });
            }
            Ok(PostProcess {
                classification: classification.to_string(),
                library: "libgstdrpai-yolo.so",
                version: "5",
                iou_threshold: iou.to_string(),
            })
        }
        // TODO: FOMO needs its own post-processing library in the plugin
        Some(ModelFamily::Fomo) | None => Err(ConvertError::UnsupportedClassifier {
            classification: classification.to_string(),
        }),
    }
}

pub fn render_post_process(table: &VariableTable) -> Result<String, ConvertError> {
    post_process(table).map(|p| p.render())
}

// ── Writers ────────────────────────────────────────────────────────────────

/// Render one descriptor without writing it.
pub fn render(kind: DescriptorKind, table: &VariableTable) -> Result<String, ConvertError> {
    match kind {
        DescriptorKind::InputMap => render_input_map(table),
        DescriptorKind::Labels => render_labels(table),
        DescriptorKind::OutputMap => render_output_map(table),
        DescriptorKind::PostProcess => render_post_process(table),
    }
}

/// Write already rendered descriptor text. Returns the path written.
pub fn write_rendered(
    kind: DescriptorKind,
    text: &str,
    output_dir: &Path,
    model_name: &str,
) -> Result<PathBuf, ConvertError> {
    let path = kind.path(output_dir, model_name);
    info!("  Writing file: {}", path.display());
    std::fs::write(&path, text).map_err(|e| ConvertError::io(&path, e))?;
    Ok(path)
}

/// Render and write one descriptor. Returns the path written.
pub fn write(
    kind: DescriptorKind,
    table: &VariableTable,
    output_dir: &Path,
    model_name: &str,
) -> Result<PathBuf, ConvertError> {
    let text = render(kind, table)?;
    write_rendered(kind, &text, output_dir, model_name)
}
