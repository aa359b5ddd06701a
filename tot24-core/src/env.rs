use std::collections::HashMap;
use std::path::Path;

pub fn env_truthy(name: &str, default_on: bool) -> bool {
    let v = std::env::var(name).ok().unwrap_or_default();
    let v = v.trim().to_lowercase();
    if v.is_empty() {
        return default_on;
    }
    !matches!(v.as_str(), "0" | "false" | "no" | "off")
}

fn unquote(v: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| v.strip_prefix(*q).and_then(|rest| rest.strip_suffix(*q)))
        .unwrap_or(v)
}

/// One `KEY=value` line; `None` for blanks, comments and malformed lines.
fn dotenv_pair(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (k, v) = line.split_once('=')?;
    let k = k.trim();
    (!k.is_empty()).then(|| (k.to_string(), unquote(v.trim()).to_string()))
}

/// Parse a `.env` file into key/value pairs. Missing or unreadable files yield nothing.
///
/// Supports `#` comments, an optional `export ` prefix and single/double quoted values.
pub fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    std::fs::read_to_string(path)
        .map(|text| text.lines().filter_map(dotenv_pair).collect())
        .unwrap_or_default()
}

/// Load `<dir>/.env` into the process env. Never overrides existing variables.
///
/// Disabled by `TOT24_DOTENV=0`. Returns how many variables were set.
pub fn load_dotenv_if_present(dir: &Path) -> usize {
    if !env_truthy("TOT24_DOTENV", true) {
        return 0;
    }
    let mut n = 0usize;
    for (k, v) in parse_dotenv(&dir.join(".env")) {
        if std::env::var(&k).ok().as_deref().unwrap_or("").is_empty() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    n
}
