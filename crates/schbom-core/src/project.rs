//! Reader for Altium `.PrjPcb` project files.
//!
//! The format is a plain ini file: `[Section]` headers followed by
//! `Key=Value` lines. Keys are case-insensitive, section names are not.

use crate::error::{Error, Result};
use crate::path::{fold_case, has_extension};

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Value of `key`, compared case-insensitively. The first occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All entries in file order, with keys spelled as written.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFile {
    sections: Vec<Section>,
}

impl ProjectFile {
    /// Parse raw project bytes. A leading UTF-8 byte-order mark is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8(bytes.to_vec())?;
        Self::parse_str(&text)
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        let mut sections: Vec<Section> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            // Indented lines continue the previous value.
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = sections.last_mut().and_then(|s| s.entries.last_mut()) {
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(Error::ProjectSyntax {
                        line: line_no,
                        message: format!("unterminated section header '{trimmed}'"),
                    });
                };
                sections.push(Section {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(Error::ProjectSyntax {
                    line: line_no,
                    message: format!("expected 'Key=Value', found '{trimmed}'"),
                });
            };
            let Some(section) = sections.last_mut() else {
                return Err(Error::ProjectSyntax {
                    line: line_no,
                    message: "entry appears before any section header".to_string(),
                });
            };
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn schdoc_paths(&self, prefix: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| fold_case(&s.name).starts_with(prefix))
            .filter_map(|s| s.get("DocumentPath"))
            .filter(|path| has_extension(path, "schdoc"))
            .collect()
    }

    /// Schematic documents of the project, as written in the file (relative
    /// to the project file, `\`-separated).
    pub fn documents(&self) -> Vec<&str> {
        self.schdoc_paths("document")
    }

    /// Device sheets referenced by the project, as written in the file.
    pub fn device_sheets(&self) -> Vec<&str> {
        self.schdoc_paths("devicesheet")
    }

    fn variant_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| s.name.starts_with("ProjectVariant"))
    }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variant_sections()
            .filter_map(|s| s.get("Description"))
            .collect()
    }

    /// The variant section whose `Description` is exactly `name`.
    pub fn variant(&self, name: &str) -> Result<&Section> {
        self.variant_sections()
            .find(|s| s.get("Description") == Some(name))
            .ok_or_else(|| Error::VariantNotFound {
                name: name.to_string(),
                available: self
                    .variant_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "\u{feff}[Design]\r\n\
        Version=1.0\r\n\
        \r\n\
        [Document1]\r\n\
        DocumentPath=Main.SchDoc\r\n\
        \r\n\
        [Document2]\r\n\
        DocumentPath=Sheets\\Sub.SCHDOC\r\n\
        \r\n\
        [Document3]\r\n\
        DocumentPath=Board.PcbDoc\r\n\
        \r\n\
        [DeviceSheet1]\r\n\
        DocumentPath=..\\Reuse\\Filter.SchDoc\r\n\
        \r\n\
        ; comment\r\n\
        [ProjectVariant1]\r\n\
        Description=Lite\r\n\
        Variation1=Designator=R1|UniqueId=\\AAAA|Kind=1\r\n\
        \r\n\
        [ProjectVariant2]\r\n\
        Description=Full\r\n";

    #[test]
    fn collects_documents_and_device_sheets() {
        let project = ProjectFile::parse(PROJECT.as_bytes()).unwrap();
        assert_eq!(project.documents(), vec!["Main.SchDoc", "Sheets\\Sub.SCHDOC"]);
        assert_eq!(project.device_sheets(), vec!["..\\Reuse\\Filter.SchDoc"]);
        assert_eq!(project.section("Design").unwrap().get("version"), Some("1.0"));
    }

    #[test]
    fn finds_variant_by_description() {
        let project = ProjectFile::parse_str(PROJECT).unwrap();
        let lite = project.variant("Lite").unwrap();
        assert_eq!(
            lite.get("variation1"),
            Some("Designator=R1|UniqueId=\\AAAA|Kind=1")
        );
    }

    #[test]
    fn unknown_variant_lists_available_ones() {
        let project = ProjectFile::parse_str(PROJECT).unwrap();
        let err = project.variant("Pro").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variant 'Pro' not found in project file. Available variants: Lite, Full"
        );
    }

    #[test]
    fn continuation_lines_extend_values() {
        let project = ProjectFile::parse_str("[A]\nKey=one\n  two\n").unwrap();
        assert_eq!(project.section("A").unwrap().get("KEY"), Some("one\ntwo"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = ProjectFile::parse_str("[A]\nnot a pair\n").unwrap_err();
        assert!(matches!(err, Error::ProjectSyntax { line: 2, .. }));

        let err = ProjectFile::parse_str("Key=Value\n").unwrap_err();
        assert!(matches!(err, Error::ProjectSyntax { line: 1, .. }));
    }
}
