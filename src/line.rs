//! Normalization of raw input lines before they reach the tokenizer.

/// Returns `true` for the characters the C locale classifies as space:
/// space, `\t`, `\n`, `\v`, `\f` and `\r`.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

/// Strip leading and trailing whitespace from a line.
///
/// The result borrows from `line`; nothing is allocated. An absent line and a
/// line made only of whitespace both yield an empty string.
pub fn trim_line(line: Option<&str>) -> &str {
    match line {
        Some(line) => line.trim_matches(is_space),
        None => "",
    }
}
