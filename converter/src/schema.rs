// schema.rs — Macro and record-schema reader for the metadata header
//
// Streams `model_metadata.h`. `#define KEY VALUE` lines become scalars;
// `typedef struct { ... } name;` blocks declare fields that are entered in
// the table as `Unset` placeholders under `<name>_<field>`. The values header
// fills them in later.
//
// Lines that do not match a known shape are skipped with a warning.

use std::io::BufRead;
use std::path::Path;

use log::debug;

use crate::diag::{codes, DiagSink, Diagnostic, SourceLoc};
use crate::error::ConvertError;
use crate::table::{Value, VariableTable};

/// Field names of one record type, in declaration order. Lives only until
/// the closing `}` of its definition.
#[derive(Debug, Default)]
struct RecordSchema {
    fields: Vec<String>,
}

enum SchemaState {
    Idle,
    InRecord(RecordSchema),
}

/// What a metadata pass added to the table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchemaSummary {
    pub macros: usize,
    /// Record names with their placeholder count.
    pub records: Vec<(String, usize)>,
}

/// The name on a member or closing line: last token without one leading
/// `*` and one trailing `;`.
fn member_name<'a>(tokens: &[&'a str]) -> &'a str {
    let last = tokens[tokens.len() - 1];
    let last = last.strip_prefix('*').unwrap_or(last);
    last.strip_suffix(';').unwrap_or(last)
}

pub fn read_schema<R: BufRead>(
    reader: R,
    file: &Path,
    table: &mut VariableTable,
    sink: &mut DiagSink,
) -> Result<SchemaSummary, ConvertError> {
    let mut summary = SchemaSummary::default();
    let mut state = SchemaState::Idle;
    let mut last_line = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConvertError::io(file, e))?;
        let line_no = idx + 1;
        last_line = line_no;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        state = match state {
            SchemaState::Idle => {
                if tokens[0] == "#define" && tokens.len() == 3 {
                    table.insert(tokens[1], Value::scalar(tokens[2]));
                    summary.macros += 1;
                    SchemaState::Idle
                } else if tokens == ["typedef", "struct", "{"] {
                    SchemaState::InRecord(RecordSchema::default())
                } else {
                    SchemaState::Idle
                }
            }
            SchemaState::InRecord(mut schema) => {
                if tokens.len() < 2 {
                    sink.report(Diagnostic::warning(
                        codes::SHORT_MEMBER,
                        SourceLoc::new(file, line_no),
                        format!("record member line '{}' ignored", line.trim()),
                    ))?;
                    SchemaState::InRecord(schema)
                } else if tokens[0] == "}" {
                    let record = member_name(&tokens);
                    for field in &schema.fields {
                        table.insert(format!("{}_{}", record, field), Value::Unset);
                    }
                    debug!("record {}: {} fields", record, schema.fields.len());
                    summary
                        .records
                        .push((record.to_string(), schema.fields.len()));
                    SchemaState::Idle
                } else {
                    schema.fields.push(member_name(&tokens).to_string());
                    SchemaState::InRecord(schema)
                }
            }
        };
    }

    if let SchemaState::InRecord(schema) = state {
        sink.report(Diagnostic::warning(
            codes::UNCLOSED_RECORD,
            SourceLoc::new(file, last_line),
            format!(
                "record definition with {} fields is never closed",
                schema.fields.len()
            ),
        ))?;
    }

    Ok(summary)
}
