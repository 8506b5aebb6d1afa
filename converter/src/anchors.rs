// anchors.rs — Anchor box projection for YOLO models
//
// The YOLO post-processor needs the anchor boxes baked into the compiled
// model. They sit in constant tensors of shape `[1, 3, g, g, 2]`, one per
// output grid `g`. Reading the model itself is the job of a `TensorSource`;
// this module only enumerates tensors by index and matches shapes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::descriptor::GRID_PREFIX;
use crate::error::ConvertError;
use crate::table::VariableTable;

/// A dense row-major f32 tensor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Element at a full index, or `None` when out of bounds.
    pub fn at(&self, index: &[usize]) -> Option<f32> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&i, &dim) in index.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        self.data.get(flat).copied()
    }
}

/// Ordinal access to the tensors of a loaded model.
pub trait TensorSource {
    /// The tensor at `index`, or `None` past the last one.
    fn tensor(&self, index: usize) -> Option<&Tensor>;
}

impl TensorSource for [Tensor] {
    fn tensor(&self, index: usize) -> Option<&Tensor> {
        self.get(index)
    }
}

impl TensorSource for Vec<Tensor> {
    fn tensor(&self, index: usize) -> Option<&Tensor> {
        self.get(index)
    }
}

/// Tensors exported from a model as JSON:
/// `{"tensors": [{"shape": [1, 3, 20, 20, 2], "data": [...]}, ...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TensorDump {
    pub tensors: Vec<Tensor>,
}

impl TensorDump {
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        info!("Reading file: {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConvertError> {
        let dump: TensorDump = serde_json::from_str(text).map_err(|e| ConvertError::TensorDump {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        for (i, t) in dump.tensors.iter().enumerate() {
            let expected: usize = t.shape.iter().product();
            if t.data.len() != expected {
                return Err(ConvertError::TensorDump {
                    path: path.to_path_buf(),
                    message: format!(
                        "tensor {} has shape {:?} but {} elements",
                        i,
                        t.shape,
                        t.data.len()
                    ),
                });
            }
        }
        Ok(dump)
    }
}

impl TensorSource for TensorDump {
    fn tensor(&self, index: usize) -> Option<&Tensor> {
        self.tensors.get(index)
    }
}

/// Grid sizes bound at `NUM_GRID_1`, `NUM_GRID_2`, ... up to the first gap.
pub fn grid_sizes(table: &VariableTable) -> Result<Vec<u32>, ConvertError> {
    let mut grids = Vec::new();
    for n in 1.. {
        let key = format!("{}{}", GRID_PREFIX, n);
        if !table.contains_key(&key) {
            break;
        }
        let text = table.scalar("anchors", &key)?;
        let g = text.trim().parse().map_err(|_| ConvertError::InvalidField {
            key: key.clone(),
            value: text.to_string(),
            reason: "expected a grid size".to_string(),
        })?;
        grids.push(g);
    }
    Ok(grids)
}

fn anchor_shape(g: u32) -> [usize; 5] {
    [1, 3, g as usize, g as usize, 2]
}

/// First tensor (scanning from index 0) whose shape is `[1, 3, g, g, 2]` for
/// one of `grids`. Returns the grid and its three anchor pairs.
fn find_grid_anchors<S: TensorSource + ?Sized>(
    source: &S,
    grids: &[u32],
) -> Option<(u32, [[f32; 2]; 3])> {
    let mut index = 0;
    while let Some(tensor) = source.tensor(index) {
        index += 1;
        let Some(&g) = grids.iter().find(|&&g| tensor.shape[..] == anchor_shape(g)) else {
            continue;
        };
        match anchor_pairs(tensor) {
            Some(anchors) => return Some((g, anchors)),
            None => debug!(
                "tensor {} has shape {:?} but only {} elements, skipped",
                index - 1,
                tensor.shape,
                tensor.data.len()
            ),
        }
    }
    None
}

/// The pairs at `[0, j, 0, 0, 0..2]`, or `None` when the data is too short.
fn anchor_pairs(tensor: &Tensor) -> Option<[[f32; 2]; 3]> {
    let mut anchors = [[0.0f32; 2]; 3];
    for (j, pair) in anchors.iter_mut().enumerate() {
        for (k, v) in pair.iter_mut().enumerate() {
            *v = tensor.at(&[0, j, 0, 0, k])?;
        }
    }
    Some(anchors)
}

/// Anchor values for every grid, in the order they are found.
pub fn project_anchors<S: TensorSource + ?Sized>(
    source: &S,
    grids: &[u32],
) -> Result<Vec<[[f32; 2]; 3]>, ConvertError> {
    let mut remaining = grids.to_vec();
    let mut found = Vec::with_capacity(grids.len());
    while !remaining.is_empty() {
        let Some((g, anchors)) = find_grid_anchors(source, &remaining) else {
            return Err(ConvertError::AnchorsNotFound { missing: remaining });
        };
        debug!("grid {}: anchors {:?}", g, anchors);
        found.push(anchors);
        remaining.retain(|&r| r != g);
    }
    Ok(found)
}

/// One number per line, floats always carrying a decimal point.
pub fn render_anchors(anchors: &[[[f32; 2]; 3]]) -> String {
    let mut out = String::new();
    for v in anchors.iter().flatten().flatten() {
        let _ = writeln!(out, "{:?}", v);
    }
    out
}

pub fn anchors_path(output_dir: &Path, model_name: &str) -> PathBuf {
    output_dir.join(format!("{}_anchors.txt", model_name))
}

/// Project anchors for the table's grids and write the anchors file.
pub fn write_anchors<S: TensorSource + ?Sized>(
    source: &S,
    table: &VariableTable,
    output_dir: &Path,
    model_name: &str,
) -> Result<PathBuf, ConvertError> {
    let grids = grid_sizes(table)?;
    let anchors = project_anchors(source, &grids)?;
    let path = anchors_path(output_dir, model_name);
    info!("  Writing file: {}", path.display());
    std::fs::write(&path, render_anchors(&anchors)).map_err(|e| ConvertError::io(&path, e))?;
    Ok(path)
}
