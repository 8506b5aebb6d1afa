// bind.rs — Value binder for the values header
//
// Streams `model_variables.h` after the metadata pass. Record initializers
// are matched against the placeholders the schema reader left in the table:
// a `TYPE name = {` line queues every table key prefixed by TYPE, and each
// following value line binds the head of that queue. Flat array initializers
// become string lists and plain declarations become scalars.
//
// Preconditions: `schema::read_schema` has run on the same table.
// Postconditions: placeholders of every initialized record are bound.
// Failure modes: SchemaMismatch (more values than fields, or end of stream
// inside an initializer), Io.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use log::debug;

use crate::diag::{codes, DiagSink, Diagnostic, SourceLoc};
use crate::error::ConvertError;
use crate::scan;
use crate::table::{Value, VariableTable};

/// NMS settings record. Its type lives in the SDK, not in the metadata
/// header, so its two fields are fixed here.
pub const NMS_CONFIG_TYPE: &str = "ei_object_detection_nms_config_t";
pub const NMS_CONFIDENCE_KEY: &str = "ei_object_detection_nms_config_t_confidence_threshold";
pub const NMS_IOU_KEY: &str = "ei_object_detection_nms_config_t_iou_threshold";

struct PendingRecord {
    record: String,
    keys: VecDeque<String>,
    start_line: usize,
}

enum BindState {
    Flat,
    Binding(PendingRecord),
    /// Every field is bound, the closing brace has not been seen yet.
    AwaitClose { record: String, start_line: usize },
    /// Array initializer spanning several lines.
    CollectingList {
        name: String,
        body: String,
        start_line: usize,
    },
    /// Initializer of a record type with no declared fields.
    Skipping { depth: i64, start_line: usize },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindSummary {
    pub scalars: usize,
    pub lists: usize,
    pub records: usize,
}

struct Binder<'a> {
    file: &'a Path,
    table: &'a mut VariableTable,
    sink: &'a mut DiagSink,
    summary: BindSummary,
}

pub fn bind_values<R: BufRead>(
    reader: R,
    file: &Path,
    table: &mut VariableTable,
    sink: &mut DiagSink,
) -> Result<BindSummary, ConvertError> {
    let mut binder = Binder {
        file,
        table,
        sink,
        summary: BindSummary::default(),
    };
    let mut state = BindState::Flat;
    let mut last_line = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConvertError::io(file, e))?;
        let line_no = idx + 1;
        last_line = line_no;
        if line.trim().is_empty() {
            continue;
        }
        state = binder.step(state, &line, line_no)?;
    }

    match state {
        BindState::Flat | BindState::AwaitClose { .. } => Ok(binder.summary),
        BindState::Binding(PendingRecord {
            record, start_line, ..
        }) => Err(binder.mismatch(
            last_line,
            format!("initializer for '{}' opened on line {} is never closed", record, start_line),
        )),
        BindState::CollectingList {
            name, start_line, ..
        } => Err(binder.mismatch(
            last_line,
            format!("array '{}' opened on line {} is never closed", name, start_line),
        )),
        BindState::Skipping { start_line, .. } => Err(binder.mismatch(
            last_line,
            format!("initializer opened on line {} is never closed", start_line),
        )),
    }
}

impl Binder<'_> {
    fn step(&mut self, state: BindState, line: &str, line_no: usize) -> Result<BindState, ConvertError> {
        match state {
            BindState::Flat => self.flat(line, line_no),
            BindState::Binding(pending) => self.bind_next(pending, line, line_no),
            BindState::AwaitClose { record, start_line } => {
                if line.trim_start().starts_with('}') {
                    return Ok(BindState::Flat);
                }
                if scan::is_comment(line) {
                    return Ok(BindState::AwaitClose { record, start_line });
                }
                Err(self.mismatch(
                    line_no,
                    format!(
                        "initializer for '{}' has more values than declared fields",
                        record
                    ),
                ))
            }
            BindState::CollectingList {
                name,
                mut body,
                start_line,
            } => {
                if scan::is_comment(line) {
                    return Ok(BindState::CollectingList {
                        name,
                        body,
                        start_line,
                    });
                }
                let code = scan::strip_trailing_comment(line);
                match code.split_once('}') {
                    Some((tail, _)) => {
                        body.push(' ');
                        body.push_str(tail);
                        self.bind_list(&name, &body);
                        Ok(BindState::Flat)
                    }
                    None => {
                        body.push(' ');
                        body.push_str(code);
                        Ok(BindState::CollectingList {
                            name,
                            body,
                            start_line,
                        })
                    }
                }
            }
            BindState::Skipping { depth, start_line } => {
                let depth = depth + brace_delta(line);
                Ok(if depth <= 0 {
                    BindState::Flat
                } else {
                    BindState::Skipping { depth, start_line }
                })
            }
        }
    }

    fn flat(&mut self, line: &str, line_no: usize) -> Result<BindState, ConvertError> {
        if !line.contains('=') {
            return Ok(BindState::Flat);
        }

        if scan::is_array_assignment(line) {
            let Some(name) = scan::declared_name(line) else {
                self.warn_short(line, line_no)?;
                return Ok(BindState::Flat);
            };
            let Some((_, rest)) = scan::strip_trailing_comment(line).split_once('{') else {
                self.warn_short(line, line_no)?;
                return Ok(BindState::Flat);
            };
            return Ok(match rest.split_once('}') {
                Some((body, _)) => {
                    self.bind_list(name, body);
                    BindState::Flat
                }
                None => BindState::CollectingList {
                    name: name.to_string(),
                    body: rest.to_string(),
                    start_line: line_no,
                },
            });
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();

        if tokens.iter().any(|t| *t == NMS_CONFIG_TYPE) {
            let keys = VecDeque::from([NMS_CONFIDENCE_KEY.to_string(), NMS_IOU_KEY.to_string()]);
            return self.open_record(NMS_CONFIG_TYPE, keys, line, line_no);
        }

        let tokens = scan::strip_qualifiers(&tokens);

        if line.contains('{') {
            let record = tokens[0];
            let keys: VecDeque<String> = self
                .table
                .keys_with_prefix(record)
                .map(str::to_string)
                .collect();
            if keys.is_empty() {
                self.sink.report(Diagnostic::warning(
                    codes::UNDECLARED_RECORD,
                    SourceLoc::new(self.file, line_no),
                    format!("no fields declared for '{}', initializer skipped", record),
                ))?;
                let depth = brace_delta(line);
                return Ok(if depth <= 0 {
                    BindState::Flat
                } else {
                    BindState::Skipping {
                        depth,
                        start_line: line_no,
                    }
                });
            }
            return self.open_record(record, keys, line, line_no);
        }

        // Plain declaration: `TYPE NAME = VALUE;`
        if tokens.len() < 2 {
            self.warn_short(line, line_no)?;
            return Ok(BindState::Flat);
        }
        let key = tokens[1].trim_start_matches('*');
        let last = tokens[tokens.len() - 1];
        let value = last.strip_suffix(';').unwrap_or(last);
        self.table.insert(key, Value::scalar(value));
        self.summary.scalars += 1;
        Ok(BindState::Flat)
    }

    /// Start binding `keys`. A `{ ... }` closed on the same line binds its
    /// comma-separated values right away.
    fn open_record(
        &mut self,
        record: &str,
        mut keys: VecDeque<String>,
        line: &str,
        line_no: usize,
    ) -> Result<BindState, ConvertError> {
        self.summary.records += 1;
        let inline = line
            .split_once('{')
            .and_then(|(_, rest)| rest.split_once('}'))
            .map(|(body, _)| body);

        let Some(body) = inline else {
            return Ok(BindState::Binding(PendingRecord {
                record: record.to_string(),
                keys,
                start_line: line_no,
            }));
        };

        for item in body.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(key) = keys.pop_front() else {
                return Err(self.mismatch(
                    line_no,
                    format!(
                        "initializer for '{}' has more values than declared fields",
                        record
                    ),
                ));
            };
            self.table.insert(key, Value::scalar(strip_quotes(item)));
        }
        if !keys.is_empty() {
            self.warn_short_initializer(record, &keys, line_no)?;
        }
        Ok(BindState::Flat)
    }

    fn bind_next(
        &mut self,
        mut pending: PendingRecord,
        line: &str,
        line_no: usize,
    ) -> Result<BindState, ConvertError> {
        if scan::is_comment(line) {
            return Ok(BindState::Binding(pending));
        }
        let first = line.split_whitespace().next().unwrap_or("");
        if first.starts_with('}') {
            self.warn_short_initializer(&pending.record, &pending.keys, line_no)?;
            return Ok(BindState::Flat);
        }

        let Some(key) = pending.keys.pop_front() else {
            // Queues are never left empty in this state
            return Err(self.mismatch(line_no, format!("no field left for '{}'", first)));
        };
        let value = strip_quotes(first.strip_suffix(',').unwrap_or(first));
        debug!("{} = {}", key, value);
        self.table.insert(key, Value::scalar(value));

        if !pending.keys.is_empty() {
            Ok(BindState::Binding(pending))
        } else if line.contains('}') {
            Ok(BindState::Flat)
        } else {
            Ok(BindState::AwaitClose {
                record: pending.record,
                start_line: pending.start_line,
            })
        }
    }

    fn bind_list(&mut self, name: &str, body: &str) {
        let items = scan::split_list_items(body);
        debug!("{}: {} items", name, items.len());
        self.table.insert(name, Value::StringList(items));
        self.summary.lists += 1;
    }

    fn warn_short(&mut self, line: &str, line_no: usize) -> Result<(), ConvertError> {
        self.sink.report(Diagnostic::warning(
            codes::SHORT_DECLARATION,
            SourceLoc::new(self.file, line_no),
            format!("declaration '{}' not understood, skipped", line.trim()),
        ))
    }

    fn warn_short_initializer(
        &mut self,
        record: &str,
        left: &VecDeque<String>,
        line_no: usize,
    ) -> Result<(), ConvertError> {
        let left: Vec<&str> = left.iter().map(String::as_str).collect();
        self.sink.report(
            Diagnostic::warning(
                codes::SHORT_INITIALIZER,
                SourceLoc::new(self.file, line_no),
                format!("initializer for '{}' ended early", record),
            )
            .with_hint(format!("still unset: {}", left.join(", "))),
        )
    }

    fn mismatch(&self, line: usize, message: String) -> ConvertError {
        ConvertError::SchemaMismatch {
            file: self.file.to_path_buf(),
            line,
            message,
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}

/// Net brace depth change of a line. Braces in string literals and comments
/// do not count.
fn brace_delta(line: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in scan::strip_trailing_comment(line).chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth
}
