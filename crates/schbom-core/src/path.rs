//! Path handling for references written by Windows-based design tools.
//!
//! Project files and sheet symbols store relative paths with `\` separators
//! and arbitrary case, while repositories store files under `/`-separated,
//! case-preserving paths. Everything here works on plain strings: the paths
//! never touch the local filesystem.

use std::collections::HashMap;

/// Case folding used for every path and sheet-name comparison.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

fn split_components(path: &str) -> impl Iterator<Item = &str> {
    path.split(['\\', '/']).filter(|c| !c.is_empty())
}

fn is_drive(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolve `reference`, a path relative to the directory containing
/// `base_file`, into a normalized `/`-separated repository path.
///
/// `reference` may use either separator. A reference starting with a
/// separator or a drive letter is taken from the repository root.
///
/// ```
/// use schbom_core::path::resolve_relative;
///
/// assert_eq!(
///     resolve_relative("Sheets\\Power.SchDoc", "Boards/Main/Main.PrjPcb"),
///     "Boards/Main/Sheets/Power.SchDoc"
/// );
/// assert_eq!(
///     resolve_relative("..\\Shared\\Io.SchDoc", "Boards/Main/Main.PrjPcb"),
///     "Boards/Shared/Io.SchDoc"
/// );
/// ```
pub fn resolve_relative(reference: &str, base_file: &str) -> String {
    let rooted = reference.starts_with(['\\', '/'])
        || split_components(reference).next().is_some_and(is_drive);

    let mut stack: Vec<&str> = Vec::new();
    if !rooted {
        stack.extend(split_components(base_file));
        // Drop the file name itself, keeping only its directory.
        stack.pop();
    }

    for component in split_components(reference) {
        match component {
            "." => {}
            ".." => {
                stack.pop();
            }
            c if is_drive(c) => {}
            c => stack.push(c),
        }
    }

    stack.join("/")
}

/// Last component of a path written with either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// File name without its final extension. Leading dots do not start an
/// extension, so `.hidden` stays `.hidden`.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Case-insensitive extension check; `ext` is given without the dot.
pub fn has_extension(path: &str, ext: &str) -> bool {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].eq_ignore_ascii_case(ext),
        _ => false,
    }
}

/// Maps case-folded keys back to the original spelling they were inserted
/// with. When two keys fold to the same value the first one wins.
#[derive(Debug, Default, Clone)]
pub struct CaseFoldedIndex {
    keys: HashMap<String, String>,
}

impl CaseFoldedIndex {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::default();
        for key in keys {
            index.insert(key);
        }
        index
    }

    pub fn insert(&mut self, key: &str) {
        self.keys
            .entry(fold_case(key))
            .or_insert_with(|| key.to_string());
    }

    /// Original spelling of the key matching `query` case-insensitively.
    pub fn get(&self, query: &str) -> Option<&str> {
        self.keys.get(&fold_case(query)).map(String::as_str)
    }

    pub fn contains(&self, query: &str) -> bool {
        self.keys.contains_key(&fold_case(query))
    }
}
