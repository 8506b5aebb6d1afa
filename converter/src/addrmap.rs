// addrmap.rs — Address map reader
//
// The address map (`<model>_addrmap_intm.txt`) lists one model section per
// line as `NAME HEX_ADDRESS HEX_SIZE`. Each well-formed line binds
// `NAME_address` and `NAME_size`; anything else is skipped.

use std::io::BufRead;
use std::path::Path;

use crate::error::ConvertError;
use crate::table::{Value, VariableTable};

/// Returns the number of sections bound.
pub fn read_address_map<R: BufRead>(
    reader: R,
    file: &Path,
    table: &mut VariableTable,
) -> Result<usize, ConvertError> {
    let mut sections = 0;
    for line in reader.lines() {
        let line = line.map_err(|e| ConvertError::io(file, e))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let [name, address, size] = tokens[..] {
            table.insert(format!("{}_address", name), Value::scalar(address));
            table.insert(format!("{}_size", name), Value::scalar(size));
            sections += 1;
        }
    }
    Ok(sections)
}
