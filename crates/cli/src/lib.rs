use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use triage_core::batch::ToolSelection;

pub mod commands;

/// Canonicalize a user-supplied path if possible, falling back to joining it
/// onto the current working directory.
pub fn canonicalize_or_current(raw: &str) -> Result<PathBuf> {
    let path = Path::new(raw);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Derive a target id from a circuit path.
///
/// Uses the file stem; a path with no usable final component falls back to
/// `unnamed-target`.
pub fn infer_target_id(circuit: &Path) -> String {
    circuit
        .file_stem()
        .and_then(|os_str| os_str.to_str())
        .unwrap_or("unnamed-target")
        .to_string()
}

/// Turn the `--tools` argument into a selection. The keyword `all` (alone or
/// anywhere in the list) selects every registered tool; names are
/// comma-separable and repeatable.
pub fn parse_tool_selection(tools: &[String]) -> ToolSelection {
    let names: Vec<String> = tools
        .iter()
        .flat_map(|raw| raw.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() || names.iter().any(|name| name.eq_ignore_ascii_case("all")) {
        ToolSelection::All
    } else {
        ToolSelection::Named(names)
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open circuit for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read circuit for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
