// pipeline.rs — Conversion state and stage orchestration
//
// The three headers and the address map must be read in a fixed order: the
// schema pass creates the placeholders the values pass fills, and the
// descriptors read what all four passes produced. Each stage is a method that
// consumes `Conversion<Stage>` and returns `Conversion<NextStage>`, so running
// them out of order does not compile.
//
// Preconditions: the output directory exists before `extract` runs.
// Postconditions: all artifacts and descriptors written, or the first error.
// Failure modes: any `ConvertError` from a stage.
// Side effects: writes binary artifacts and descriptor files.

use std::fs::File;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::addrmap;
use crate::anchors::{self, TensorDump, TensorSource};
use crate::bind::{self, BindSummary};
use crate::descriptor::{self, DescriptorKind, PostProcess};
use crate::diag::{codes, DiagLevel, DiagSink, Diagnostic};
use crate::error::ConvertError;
use crate::extract::{self, ArrayNaming, Artifact};
use crate::schema::{self, SchemaSummary};
use crate::table::VariableTable;

// ── Options ────────────────────────────────────────────────────────────────

/// Everything a conversion run needs to locate its inputs and outputs.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Folder and file-name prefix of everything written.
    pub model_name: String,
    /// Directory holding `tflite-model/` and `model-parameters/`.
    pub working_dir: PathBuf,
    /// Promote skipped-line warnings to errors.
    pub strict: bool,
    /// Read the address map from here instead of the extracted artifact.
    pub address_map: Option<PathBuf>,
    /// JSON tensor dump used to recover YOLO anchors.
    pub tensors: Option<PathBuf>,
}

impl ConvertOptions {
    pub fn new(model_name: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_name: model_name.into(),
            working_dir: working_dir.into(),
            strict: false,
            address_map: None,
            tensors: None,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.working_dir.join(&self.model_name)
    }

    pub fn declarations_path(&self) -> PathBuf {
        self.working_dir.join("tflite-model").join("drpai_model.h")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.working_dir
            .join("model-parameters")
            .join("model_metadata.h")
    }

    pub fn values_path(&self) -> PathBuf {
        self.working_dir
            .join("model-parameters")
            .join("model_variables.h")
    }

    /// Written by the extractor from the `ei_ei_addrmap_intm_txt` array
    /// unless overridden.
    pub fn address_map_path(&self) -> PathBuf {
        self.address_map.clone().unwrap_or_else(|| {
            self.output_dir()
                .join(format!("{}_addrmap_intm.txt", self.model_name))
        })
    }

    fn naming(&self) -> (String, PathBuf) {
        (self.model_name.clone(), self.output_dir())
    }
}

// ── Stages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    Extract,
    ReadSchema,
    BindValues,
    ReadAddressMap,
    Descriptors,
    Anchors,
}

impl StageId {
    pub fn name(self) -> &'static str {
        match self {
            StageId::Extract => "extract",
            StageId::ReadSchema => "read_schema",
            StageId::BindValues => "bind_values",
            StageId::ReadAddressMap => "read_address_map",
            StageId::Descriptors => "descriptors",
            StageId::Anchors => "anchors",
        }
    }
}

/// Typestate markers. A `Conversion<S>` has completed every stage up to `S`.
pub mod stage {
    pub enum Start {}
    pub enum Extracted {}
    pub enum SchemaRead {}
    pub enum ValuesBound {}
    pub enum Resolved {}
}

/// Conversion state threaded through the stages.
pub struct Conversion<S> {
    options: ConvertOptions,
    table: VariableTable,
    artifacts: Vec<Artifact>,
    diagnostics: Vec<Diagnostic>,
    _stage: PhantomData<S>,
}

impl<S> Conversion<S> {
    fn advance<T>(self) -> Conversion<T> {
        Conversion {
            options: self.options,
            table: self.table,
            artifacts: self.artifacts,
            diagnostics: self.diagnostics,
            _stage: PhantomData,
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn table(&self) -> &VariableTable {
        &self.table
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Warnings collected so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn finish_stage(&mut self, id: StageId, sink: DiagSink, started: Instant) {
        for d in sink.diagnostics() {
            match d.level {
                DiagLevel::Warning => warn!("{}", d),
                DiagLevel::Error => log::error!("{}", d),
            }
        }
        self.diagnostics.extend(sink.into_diagnostics());
        debug!(
            "{} complete, {:.1}ms",
            id.name(),
            started.elapsed().as_secs_f64() * 1000.0
        );
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ConvertError> {
    info!("Reading file: {}", path.display());
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ConvertError::io(path, e))
}

impl Conversion<stage::Start> {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            table: VariableTable::new(),
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
            _stage: PhantomData,
        }
    }

    /// Write every array of the declarations header to its binary file.
    pub fn extract(mut self) -> Result<Conversion<stage::Extracted>, ConvertError> {
        let started = Instant::now();
        let path = self.options.declarations_path();
        let (model_name, output_dir) = self.options.naming();
        let naming = ArrayNaming {
            model_name: &model_name,
            output_dir: &output_dir,
        };
        let mut sink = DiagSink::new(self.options.strict);
        self.artifacts =
            extract::extract_arrays(open(&path)?, &path, &naming, &mut self.table, &mut sink)?;
        self.finish_stage(StageId::Extract, sink, started);
        Ok(self.advance())
    }
}

impl Conversion<stage::Extracted> {
    pub fn read_schema(mut self) -> Result<(Conversion<stage::SchemaRead>, SchemaSummary), ConvertError> {
        let started = Instant::now();
        let path = self.options.metadata_path();
        let mut sink = DiagSink::new(self.options.strict);
        let summary = schema::read_schema(open(&path)?, &path, &mut self.table, &mut sink)?;
        self.finish_stage(StageId::ReadSchema, sink, started);
        Ok((self.advance(), summary))
    }
}

impl Conversion<stage::SchemaRead> {
    pub fn bind_values(mut self) -> Result<(Conversion<stage::ValuesBound>, BindSummary), ConvertError> {
        let started = Instant::now();
        let path = self.options.values_path();
        let mut sink = DiagSink::new(self.options.strict);
        let summary = bind::bind_values(open(&path)?, &path, &mut self.table, &mut sink)?;
        self.finish_stage(StageId::BindValues, sink, started);
        Ok((self.advance(), summary))
    }
}

impl Conversion<stage::ValuesBound> {
    pub fn read_address_map(mut self) -> Result<Conversion<stage::Resolved>, ConvertError> {
        let started = Instant::now();
        let path = self.options.address_map_path();
        let sections = addrmap::read_address_map(open(&path)?, &path, &mut self.table)?;
        debug!("{} address map sections", sections);
        self.finish_stage(StageId::ReadAddressMap, DiagSink::new(false), started);
        Ok(self.advance())
    }
}

/// Files written by the descriptor and anchor stages.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub descriptors: Vec<PathBuf>,
    pub post_process: PostProcess,
    pub anchors: Option<PathBuf>,
}

impl Conversion<stage::Resolved> {
    /// Write the four descriptors, in plugin order.
    pub fn write_descriptors(&mut self) -> Result<(Vec<PathBuf>, PostProcess), ConvertError> {
        let started = Instant::now();
        let output_dir = self.options.output_dir();
        let model = &self.options.model_name;
        let mut written = Vec::with_capacity(4);
        for kind in [
            DescriptorKind::InputMap,
            DescriptorKind::Labels,
            DescriptorKind::OutputMap,
        ] {
            written.push(descriptor::write(kind, &self.table, &output_dir, model)?);
        }
        let post_process = descriptor::post_process(&self.table)?;
        written.push(descriptor::write_rendered(
            DescriptorKind::PostProcess,
            &post_process.render(),
            &output_dir,
            model,
        )?);
        self.finish_stage(StageId::Descriptors, DiagSink::new(false), started);
        Ok((written, post_process))
    }

    /// Write the anchors file from `source`.
    pub fn write_anchors<T: TensorSource + ?Sized>(
        &mut self,
        source: &T,
    ) -> Result<PathBuf, ConvertError> {
        let started = Instant::now();
        let path = anchors::write_anchors(
            source,
            &self.table,
            &self.options.output_dir(),
            &self.options.model_name,
        )?;
        self.finish_stage(StageId::Anchors, DiagSink::new(false), started);
        Ok(path)
    }

    /// Descriptors, then anchors when the classification needs them and a
    /// tensor dump is configured.
    pub fn generate(&mut self) -> Result<Outputs, ConvertError> {
        let (descriptors, post_process) = self.write_descriptors()?;
        let anchors = if !post_process.needs_anchors() {
            None
        } else if let Some(dump_path) = self.options.tensors.clone() {
            let dump = TensorDump::load(&dump_path)?;
            Some(self.write_anchors(&dump)?)
        } else {
            let mut sink = DiagSink::new(self.options.strict);
            sink.report(
                Diagnostic::new(
                    DiagLevel::Warning,
                    format!(
                        "'{}' needs anchors but no tensor dump was given, anchors file not written",
                        post_process.classification
                    ),
                )
                .with_code(codes::NO_TENSOR_SOURCE)
                .with_hint("pass --tensors <dump.json>"),
            )?;
            self.finish_stage(StageId::Anchors, sink, Instant::now());
            None
        };
        Ok(Outputs {
            descriptors,
            post_process,
            anchors,
        })
    }
}

/// Run every reading stage in order.
pub fn read_all(options: ConvertOptions) -> Result<Conversion<stage::Resolved>, ConvertError> {
    let extracted = Conversion::new(options).extract()?;
    let (schema_read, schema) = extracted.read_schema()?;
    debug!(
        "{} macros, {} records declared",
        schema.macros,
        schema.records.len()
    );
    let (bound, values) = schema_read.bind_values()?;
    debug!(
        "{} scalars, {} lists, {} records bound",
        values.scalars, values.lists, values.records
    );
    bound.read_address_map()
}

/// Full conversion: read everything, then write descriptors and anchors.
pub fn run(options: ConvertOptions) -> Result<(Conversion<stage::Resolved>, Outputs), ConvertError> {
    let mut conversion = read_all(options)?;
    let outputs = conversion.generate()?;
    Ok((conversion, outputs))
}

// ── Provenance ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FileDigest {
    pub path: PathBuf,
    pub bytes: usize,
    pub sha256: String,
}

/// What a run read and wrote, for `--emit build-info`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub converter_version: &'static str,
    pub model_name: String,
    pub inputs: Vec<FileDigest>,
    pub artifacts: Vec<FileDigest>,
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn digest_file(path: &Path) -> Result<FileDigest, ConvertError> {
    use sha2::{Digest, Sha256};

    let data = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
    Ok(FileDigest {
        path: path.to_path_buf(),
        bytes: data.len(),
        sha256: bytes_to_hex(&Sha256::digest(&data)),
    })
}

impl<S> Conversion<S> {
    /// Hash the three headers and list the artifacts hashed at write time.
    pub fn build_info(&self) -> Result<BuildInfo, ConvertError> {
        let inputs = [
            self.options.declarations_path(),
            self.options.metadata_path(),
            self.options.values_path(),
        ]
        .iter()
        .map(|p| digest_file(p))
        .collect::<Result<Vec<_>, _>>()?;
        let artifacts = self
            .artifacts
            .iter()
            .map(|a| FileDigest {
                path: a.path.clone(),
                bytes: a.len,
                sha256: a.sha256_hex(),
            })
            .collect();
        Ok(BuildInfo {
            converter_version: env!("CARGO_PKG_VERSION"),
            model_name: self.options.model_name.clone(),
            inputs,
            artifacts,
        })
    }
}
