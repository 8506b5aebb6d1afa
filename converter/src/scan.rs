// scan.rs — Token-level helpers shared by the header readers
//
// The headers are scanned line by line at the text level. No C parsing;
// each helper recognizes one fixed shape emitted by the generator.

/// Declaration qualifiers that may precede the type in a values-header line.
const QUALIFIERS: &[&str] = &["const", "static", "constexpr", "extern", "volatile"];

/// True when the line assigns to an array, i.e. `name[...]` appears left of `=`.
pub fn is_array_assignment(line: &str) -> bool {
    match line.split_once('=') {
        Some((lhs, _)) => lhs.find('[').is_some_and(|open| lhs[open..].contains(']')),
        None => false,
    }
}

/// Drop leading qualifier tokens.
pub fn strip_qualifiers<'a>(tokens: &'a [&'a str]) -> &'a [&'a str] {
    let skip = tokens
        .iter()
        .take_while(|t| QUALIFIERS.contains(*t))
        .count();
    &tokens[skip..]
}

/// The identifier declared on the left of `=`: last token before the `=`,
/// without a pointer sigil or array suffix.
pub fn declared_name(line: &str) -> Option<&str> {
    let (lhs, _) = line.split_once('=')?;
    let token = lhs.split_whitespace().last()?;
    let token = token.trim_start_matches('*');
    let name = match token.find('[') {
        Some(open) => &token[..open],
        None => token,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Split a brace body into list items: quotes and spaces removed, split on
/// `,`. A trailing empty item left by a dangling comma is dropped.
pub fn split_list_items(body: &str) -> Vec<String> {
    let cleaned: String = body
        .chars()
        .filter(|c| *c != '"' && !c.is_whitespace())
        .collect();
    let mut items: Vec<String> = cleaned.split(',').map(str::to_string).collect();
    if items.last().is_some_and(|s| s.is_empty()) {
        items.pop();
    }
    items
}

/// Line consisting only of a comment.
pub fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("//") || t.starts_with("/*") || t.starts_with('*')
}

/// The line cut at the first `//` or `/*` outside a string literal, with
/// trailing whitespace removed.
pub fn strip_trailing_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'/' if !in_string && matches!(bytes.get(i + 1), Some(b'/' | b'*')) => {
                return line[..i].trim_end();
            }
            _ => {}
        }
        i += 1;
    }
    line
}
