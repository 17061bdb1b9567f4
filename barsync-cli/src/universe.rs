use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Parse a universe file: one symbol per line, `#` starts a comment.
///
/// Symbols are trimmed and upper-cased; blank lines are ignored and repeated
/// symbols keep their first position.
pub fn parse(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Read and parse the universe file at `path`.
pub fn load(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading symbol universe {}", path.display()))?;
    let symbols = parse(&text);
    if symbols.is_empty() {
        bail!("symbol universe {} lists no symbols", path.display());
    }
    Ok(symbols)
}
