// Property-based tests for header reading invariants.
//
// Four categories:
// 1. Byte lists: any byte sequence rendered as hex rows decodes back exactly
// 2. Array extraction: artifact contents and `_len` checks for arbitrary arrays
// 3. Record binding: generated schemas and initializers bind every field in order
// 4. Labels: a label list is accepted only when it matches the declared count
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::io::Cursor;
use std::path::Path;

use ei2gst::codec;
use ei2gst::descriptor::{self, LABELS_KEY, LABEL_COUNT_KEY};
use ei2gst::diag::DiagSink;
use ei2gst::extract::{self, ArrayNaming};
use ei2gst::table::{Value, VariableTable};
use ei2gst::{bind, schema, ConvertError};
use proptest::prelude::*;

// ── Generators ──────────────────────────────────────────────────────────────

/// Render bytes the way xxd-style generators do: rows of twelve, every token
/// followed by a comma. Prefix case varies per token.
fn render_rows(bytes: &[u8], upper: &[bool]) -> Vec<String> {
    bytes
        .chunks(12)
        .enumerate()
        .map(|(row, chunk)| {
            let tokens: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    if upper[(row * 12 + i) % upper.len()] {
                        format!("0X{:02X},", b)
                    } else {
                        format!("0x{:02x},", b)
                    }
                })
                .collect();
            format!("  {}", tokens.join(" "))
        })
        .collect()
}

fn arb_field_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9]{0,7}", 1..8)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn arb_labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9 ]{0,10}[a-z0-9]", 1..10)
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ei2gst_prop_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ── Byte lists ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn hex_rows_decode_to_source_bytes(
        bytes in prop::collection::vec(any::<u8>(), 0..100),
        upper in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let mut decoded = Vec::new();
        for row in render_rows(&bytes, &upper) {
            codec::decode_line_into(&row, &mut decoded).unwrap();
        }
        prop_assert_eq!(decoded, bytes);
    }

    #[test]
    fn decoded_length_counts_non_empty_tokens(
        bytes in prop::collection::vec(any::<u8>(), 1..24),
        trailing_comma in any::<bool>(),
    ) {
        let mut line = bytes
            .iter()
            .map(|b| format!("{:#04x}", b))
            .collect::<Vec<_>>()
            .join(", ");
        if trailing_comma {
            line.push(',');
        }
        prop_assert_eq!(codec::decode_line(&line).unwrap().len(), bytes.len());
    }

    #[test]
    fn non_hex_token_is_rejected(
        prefix in prop::collection::vec(any::<u8>(), 0..6),
        bad in "[g-z]{1,3}",
    ) {
        let mut line: String = prefix.iter().map(|b| format!("0x{:02x}, ", b)).collect();
        line.push_str(&bad);
        let err = codec::decode_line(&line).unwrap_err();
        prop_assert_eq!(err.token, bad);
    }
}

// ── Array extraction ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 30,
        max_shrink_iters: 50,
        .. ProptestConfig::default()
    })]

    #[test]
    fn extracted_artifact_matches_declared_bytes(
        bytes in prop::collection::vec(any::<u8>(), 0..200),
        off_by in prop_oneof![Just(0usize), 1usize..5],
    ) {
        let dir = scratch_dir("extract");
        let mut header = String::from("unsigned char ei_blob_bin[] = {\n");
        for row in render_rows(&bytes, &[false]) {
            header.push_str(&row);
            header.push('\n');
        }
        header.push_str("};\n");
        header.push_str(&format!(
            "const unsigned int ei_blob_bin_len = {};\n",
            bytes.len() + off_by
        ));

        let naming = ArrayNaming { model_name: "m", output_dir: &dir };
        let mut table = VariableTable::new();
        let mut sink = DiagSink::new(false);
        let result = extract::extract_arrays(
            Cursor::new(header),
            Path::new("drpai_model.h"),
            &naming,
            &mut table,
            &mut sink,
        );

        // The file is written before the length check either way
        prop_assert_eq!(std::fs::read(dir.join("blob.bin")).unwrap(), bytes.clone());
        if off_by == 0 {
            let artifacts = result.unwrap();
            prop_assert_eq!(artifacts.len(), 1);
            prop_assert_eq!(artifacts[0].len, bytes.len());
        } else {
            let is_corrupt = matches!(result, Err(ConvertError::CorruptArtifact { .. }));
            prop_assert!(is_corrupt);
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}

// ── Record binding ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn record_fields_bind_in_declaration_order(
        fields in arb_field_names(),
        seed in any::<u32>(),
    ) {
        let mut metadata = String::from("typedef struct {\n");
        for f in &fields {
            metadata.push_str(&format!("    uint32_t {};\n", f));
        }
        metadata.push_str("} rec_t;\n");

        let values: Vec<String> = (0..fields.len())
            .map(|i| (seed as u64 + i as u64).to_string())
            .collect();
        let mut variables = String::from("rec_t rec_0 = {\n");
        for (i, v) in values.iter().enumerate() {
            let sep = if i + 1 < values.len() { "," } else { "" };
            variables.push_str(&format!("    {}{} // field {}\n", v, sep, i));
        }
        variables.push_str("};\n");

        let mut table = VariableTable::new();
        let mut sink = DiagSink::new(true);
        let declared = schema::read_schema(
            Cursor::new(metadata),
            Path::new("model_metadata.h"),
            &mut table,
            &mut sink,
        )
        .unwrap();
        prop_assert_eq!(declared.records, vec![("rec_t".to_string(), fields.len())]);
        prop_assert_eq!(table.unset_keys().count(), fields.len());

        let bound = bind::bind_values(
            Cursor::new(variables),
            Path::new("model_variables.h"),
            &mut table,
            &mut sink,
        )
        .unwrap();
        prop_assert_eq!(bound.records, 1);

        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        let expected: Vec<String> = fields.iter().map(|f| format!("rec_t_{}", f)).collect();
        prop_assert_eq!(keys, expected.iter().map(String::as_str).collect::<Vec<_>>());
        for (key, value) in expected.iter().zip(&values) {
            prop_assert_eq!(table.get(key), Some(&Value::scalar(value.as_str())));
        }
    }

    #[test]
    fn extra_initializer_value_is_a_mismatch(fields in arb_field_names()) {
        let mut metadata = String::from("typedef struct {\n");
        for f in &fields {
            metadata.push_str(&format!("    int {};\n", f));
        }
        metadata.push_str("} rec_t;\n");
        let mut variables = String::from("rec_t rec_0 = {\n");
        for i in 0..=fields.len() {
            variables.push_str(&format!("    {},\n", i));
        }
        variables.push_str("};\n");

        let mut table = VariableTable::new();
        let mut sink = DiagSink::new(false);
        schema::read_schema(Cursor::new(metadata), Path::new("m.h"), &mut table, &mut sink)
            .unwrap();
        let result =
            bind::bind_values(Cursor::new(variables), Path::new("v.h"), &mut table, &mut sink);
        let is_mismatch = matches!(result, Err(ConvertError::SchemaMismatch { .. }));
        prop_assert!(is_mismatch);
    }
}

// ── Labels ──────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn labels_accepted_only_at_declared_count(
        labels in arb_labels(),
        extra in 1usize..3,
    ) {
        let mut table = VariableTable::new();
        table.insert(LABELS_KEY, Value::StringList(labels.clone()));

        table.insert(LABEL_COUNT_KEY, Value::scalar(labels.len().to_string()));
        prop_assert_eq!(descriptor::render_labels(&table).unwrap(), labels.join("\n"));

        table.insert(LABEL_COUNT_KEY, Value::scalar((labels.len() + extra).to_string()));
        match descriptor::render_labels(&table) {
            Err(ConvertError::LabelCountMismatch { expected, found }) => {
                prop_assert_eq!(expected, labels.len() + extra);
                prop_assert_eq!(found, labels.len());
            }
            other => prop_assert!(false, "expected LabelCountMismatch, got {:?}", other),
        }
    }
}
