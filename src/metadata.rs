//! Example-metadata templating: copy a tree, substitute placeholders.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Extensions treated as text during templating; everything else is
/// copied byte-for-byte.
const TEXT_EXTENSIONS: &[&str] = &[
    "cls", "cmp", "css", "csv", "html", "js", "json", "md", "txt", "xml",
];

/// Copy an example metadata tree into `dest`, substituting placeholder
/// tokens in text files. Token keys are the literal placeholder text,
/// e.g. `$STORE_NAME`.
pub fn copy_with_tokens(src: &Path, dest: &Path, tokens: &HashMap<String, String>) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Path outside source tree: {}", entry.path().display()))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            if is_text_file(entry.path()) {
                let contents = fs::read_to_string(entry.path())
                    .with_context(|| format!("Failed to read {}", entry.path().display()))?;
                fs::write(&target, apply_tokens(&contents, tokens))
                    .with_context(|| format!("Failed to write {}", target.display()))?;
            } else {
                fs::copy(entry.path(), &target)
                    .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            }
        }
    }
    Ok(())
}

pub fn apply_tokens(content: &str, tokens: &HashMap<String, String>) -> String {
    let mut out = content.to_string();
    for (token, value) in tokens {
        out = out.replace(token, value);
    }
    out
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
