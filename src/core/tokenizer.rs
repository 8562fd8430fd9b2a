use crate::domain::model::RowValues;

pub const DEFAULT_DELIMITER: char = ',';

/// Split one line into trimmed fields.
///
/// A `"` toggles quoted mode and is dropped from the output; a delimiter
/// inside quotes is kept as data. Doubled quotes (`""`) are not unescaped, and
/// an unbalanced quote leaves the rest of the line quoted.
pub fn split_line(line: &str, delimiter: char) -> RowValues {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    fields.push(current.trim().to_string());
    fields
}
