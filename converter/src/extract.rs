// extract.rs — Array extraction from the declarations header
//
// Streams `drpai_model.h`, writing every `unsigned char name[] = { ... };`
// block to its own binary file and recording scalar assignments in the
// table. Each `<name>_len` scalar is checked against the array that closed
// just before it, as soon as it is read.
//
// Preconditions: the output directory exists.
// Postconditions: one file per array block, scalars bound in the table.
// Failure modes: MalformedByteToken, CorruptArtifact, UnterminatedBlock, Io.
// Side effects: creates or overwrites the binary artifact files.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::codec;
use crate::diag::{codes, DiagSink, Diagnostic, SourceLoc};
use crate::error::ConvertError;
use crate::scan;
use crate::table::{Value, VariableTable};

/// Where array blocks are written and how their file names are formed.
#[derive(Debug, Clone)]
pub struct ArrayNaming<'a> {
    pub model_name: &'a str,
    pub output_dir: &'a Path,
}

impl ArrayNaming<'_> {
    /// Output path for the array declared on `line`.
    ///
    /// `unsigned char ei_ei_addrmap_intm_txt[] = {` with model `model`
    /// becomes `<output_dir>/model_addrmap_intm.txt`.
    pub fn artifact_path(&self, line: &str) -> PathBuf {
        self.output_dir.join(artifact_file_name(line, self.model_name))
    }
}

/// File name for an array declaration line.
pub fn artifact_file_name(line: &str, model_name: &str) -> String {
    let lhs = line.split('=').next().unwrap_or(line).trim();
    let lhs = lhs.strip_prefix("const ").unwrap_or(lhs);
    let lhs = lhs.strip_prefix("unsigned char ").unwrap_or(lhs).trim_start();
    let lhs = lhs.strip_prefix("ei_").unwrap_or(lhs);
    let ident = match lhs.find('[') {
        Some(open) => &lhs[..open],
        None => lhs,
    };
    let ident = ident.trim().replace("ei_", &format!("{}_", model_name));
    match ident.rsplit_once('_') {
        Some((stem, ext)) => format!("{}.{}", stem, ext),
        None => ident,
    }
}

/// A binary file written by the extractor.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub len: usize,
    pub sha256: [u8; 32],
}

impl Artifact {
    pub fn sha256_hex(&self) -> String {
        crate::pipeline::bytes_to_hex(&self.sha256)
    }
}

/// The array block currently being read. Dropping it releases the buffer.
struct OpenArray {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl OpenArray {
    fn append(&mut self, body: &str, file: &Path, line: usize) -> Result<(), ConvertError> {
        codec::decode_line_into(body, &mut self.bytes).map_err(|e| {
            ConvertError::MalformedByteToken {
                file: file.to_path_buf(),
                line,
                token: e.token,
            }
        })
    }

    /// Write the buffer out and consume the block.
    fn flush(self) -> Result<Artifact, ConvertError> {
        std::fs::write(&self.path, &self.bytes).map_err(|e| ConvertError::io(&self.path, e))?;
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&Sha256::digest(&self.bytes));
        Ok(Artifact {
            path: self.path,
            len: self.bytes.len(),
            sha256,
        })
    }
}

enum BlockState {
    Outside,
    Inside(OpenArray),
}

/// Stream a declarations header, writing arrays and binding scalars.
/// Returns the written artifacts in declaration order.
pub fn extract_arrays<R: BufRead>(
    reader: R,
    file: &Path,
    naming: &ArrayNaming<'_>,
    table: &mut VariableTable,
    sink: &mut DiagSink,
) -> Result<Vec<Artifact>, ConvertError> {
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut state = BlockState::Outside;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConvertError::io(file, e))?;
        let line_no = idx + 1;

        state = match state {
            BlockState::Outside => {
                if !line.contains('=') {
                    BlockState::Outside
                } else if scan::is_array_assignment(&line) {
                    let mut open = OpenArray {
                        path: naming.artifact_path(&line),
                        bytes: Vec::new(),
                    };
                    info!("  Writing file: {}", open.path.display());
                    // Bytes may follow the `{` on the declaration line itself.
                    let rest = line.split_once('{').map(|(_, r)| r).unwrap_or("");
                    match rest.split_once('}') {
                        Some((body, _)) => {
                            open.append(body, file, line_no)?;
                            artifacts.push(open.flush()?);
                            BlockState::Outside
                        }
                        None => {
                            open.append(rest, file, line_no)?;
                            BlockState::Inside(open)
                        }
                    }
                } else {
                    bind_scalar(&line, file, line_no, artifacts.last(), table, sink)?;
                    BlockState::Outside
                }
            }
            BlockState::Inside(mut open) => match line.split_once('}') {
                Some((body, _)) => {
                    open.append(body, file, line_no)?;
                    let artifact = open.flush()?;
                    debug!("{}: {} bytes", artifact.path.display(), artifact.len);
                    artifacts.push(artifact);
                    BlockState::Outside
                }
                None => {
                    open.append(&line, file, line_no)?;
                    BlockState::Inside(open)
                }
            },
        };
    }

    match state {
        BlockState::Outside => Ok(artifacts),
        BlockState::Inside(open) => Err(ConvertError::UnterminatedBlock {
            file: file.to_path_buf(),
            path: open.path,
        }),
    }
}

/// Bind `... KEY = VALUE;` and check `_len` keys against `last`.
fn bind_scalar(
    line: &str,
    file: &Path,
    line_no: usize,
    last: Option<&Artifact>,
    table: &mut VariableTable,
    sink: &mut DiagSink,
) -> Result<(), ConvertError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return sink.report(Diagnostic::warning(
            codes::SHORT_ASSIGNMENT,
            SourceLoc::new(file, line_no),
            format!("assignment '{}' has too few tokens, skipped", line.trim()),
        ));
    }
    let key = tokens[tokens.len() - 3];
    let last_token = tokens[tokens.len() - 1];
    let value = last_token.strip_suffix(';').unwrap_or(last_token);
    table.insert(key, Value::scalar(value));

    if key.ends_with("_len") {
        let actual = last.map_or(0, |a| a.len);
        if value.parse::<usize>().ok() != Some(actual) {
            return Err(ConvertError::CorruptArtifact {
                path: last.map_or_else(|| PathBuf::from(key), |a| a.path.clone()),
                key: key.to_string(),
                declared: value.to_string(),
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ei2gst_extract_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn run(src: &str, dir: &Path) -> (Result<Vec<Artifact>, ConvertError>, VariableTable) {
        let mut table = VariableTable::new();
        let mut sink = DiagSink::new(false);
        let naming = ArrayNaming {
            model_name: "model",
            output_dir: dir,
        };
        let result = extract_arrays(
            src.as_bytes(),
            Path::new("drpai_model.h"),
            &naming,
            &mut table,
            &mut sink,
        );
        (result, table)
    }

    #[test]
    fn file_names_follow_declarations() {
        assert_eq!(
            artifact_file_name("unsigned char ei_ei_addrmap_intm_txt[] = {", "model"),
            "model_addrmap_intm.txt"
        );
        assert_eq!(
            artifact_file_name("unsigned char ei_drp_desc_bin[] = {", "model"),
            "drp_desc.bin"
        );
        assert_eq!(
            artifact_file_name("unsigned char ei_ei_weight_dat[] = {", "yolo"),
            "yolo_weight.dat"
        );
        assert_eq!(artifact_file_name("DATA[] = {0x01,}", "model"), "DATA");
    }

    #[test]
    fn writes_array_and_checks_len() {
        let dir = scratch_dir("ok");
        let src = "\
const unsigned int model_version = 3;
unsigned char ei_drp_desc_bin[] = {
  0x01, 0x02, 0x03,
  0x04,
};
const unsigned int ei_drp_desc_bin_len = 4;
";
        let (result, table) = run(src, &dir);
        let artifacts = result.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, dir.join("drp_desc.bin"));
        assert_eq!(artifacts[0].len, 4);
        assert_eq!(std::fs::read(dir.join("drp_desc.bin")).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(table.get("model_version"), Some(&Value::scalar("3")));
        assert_eq!(table.get("ei_drp_desc_bin_len"), Some(&Value::scalar("4")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn single_line_array() {
        let dir = scratch_dir("single_line");
        let (result, table) = run("DATA[] = {0x01, 0x02,}\nDATA_len = 2;\n", &dir);
        let artifacts = result.unwrap();
        assert_eq!(std::fs::read(&artifacts[0].path).unwrap(), vec![1, 2]);
        assert_eq!(table.get("DATA_len"), Some(&Value::scalar("2")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn len_mismatch_is_corrupt() {
        let dir = scratch_dir("corrupt");
        let (result, _) = run("DATA[] = {0x01, 0x02, 0x03,}\nDATA_len = 2;\n", &dir);
        match result.unwrap_err() {
            ConvertError::CorruptArtifact {
                path,
                declared,
                actual,
                ..
            } => {
                assert_eq!(path, dir.join("DATA"));
                assert_eq!(declared, "2");
                assert_eq!(actual, 3);
            }
            other => panic!("expected CorruptArtifact, got: {}", other),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn len_before_any_array_must_be_zero() {
        let dir = scratch_dir("len_first");
        let (result, _) = run("const unsigned int x_len = 5;\n", &dir);
        assert!(matches!(result, Err(ConvertError::CorruptArtifact { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unterminated_block() {
        let dir = scratch_dir("unterminated");
        let (result, _) = run("unsigned char ei_drp_param_bin[] = {\n0x01, 0x02,\n", &dir);
        match result.unwrap_err() {
            ConvertError::UnterminatedBlock { path, .. } => {
                assert_eq!(path, dir.join("drp_param.bin"))
            }
            other => panic!("expected UnterminatedBlock, got: {}", other),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_byte_reports_line() {
        let dir = scratch_dir("malformed");
        let (result, _) = run("unsigned char ei_a_bin[] = {\n0x01,\n0x0g,\n};\n", &dir);
        match result.unwrap_err() {
            ConvertError::MalformedByteToken { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "0x0g");
            }
            other => panic!("expected MalformedByteToken, got: {}", other),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn short_assignment_is_a_warning() {
        let dir = scratch_dir("short");
        let mut table = VariableTable::new();
        let mut sink = DiagSink::new(false);
        let naming = ArrayNaming {
            model_name: "model",
            output_dir: &dir,
        };
        extract_arrays(
            "x=1;\n".as_bytes(),
            Path::new("drpai_model.h"),
            &naming,
            &mut table,
            &mut sink,
        )
        .unwrap();
        assert!(table.is_empty());
        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.diagnostics()[0].code, Some(codes::SHORT_ASSIGNMENT));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn artifact_hash_matches_contents() {
        let dir = scratch_dir("hash");
        let (result, _) = run("unsigned char ei_x_bin[] = {\n0x61, 0x62, 0x63,\n};\n", &dir);
        let artifacts = result.unwrap();
        // SHA-256("abc")
        assert_eq!(
            artifacts[0].sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
