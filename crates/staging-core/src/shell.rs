//! Quoting of values interpolated into downloader command lines.

const SAFE: &str = "@%_+=:,./-";
const DANGEROUS: &str = "!\"`$\\";

/// Quote a word for a POSIX shell so it is read back as a single token.
///
/// Words made only of safe characters are returned unchanged.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SAFE.contains(c))
    {
        return word.to_string();
    }
    if !word.chars().any(|c| DANGEROUS.contains(c)) {
        return format!("\"{word}\"");
    }
    if !word.contains('\'') {
        return format!("'{word}'");
    }

    // Close the single-quoted run, emit an escaped quote, reopen.
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Escape a value for use inside a PowerShell single-quoted string literal.
pub fn powershell_literal(value: &str) -> String {
    value.replace('\'', "''")
}
