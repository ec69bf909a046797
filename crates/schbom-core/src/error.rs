use thiserror::Error;

use crate::source::FetchError;
use crate::Tool;

/// Every fatal condition raised while listing components or building a BOM.
///
/// Recoverable conditions (malformed variation directives, duplicate device
/// sheet matches, blank components) are logged instead and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid repetition marker in sheet name '{name}': {reason}")]
    InvalidRepetition { name: String, reason: String },

    #[error(
        "Sheet reference on '{sheet}' has no filename; check the sheet symbols of that document for an empty file path"
    )]
    MissingSheetFilename { sheet: String },

    #[error("Sheet '{parent}' references '{reference}', which is neither a project document nor a device sheet")]
    UnknownSheetReference { parent: String, reference: String },

    #[error("Component on sheet '{sheet}' is repeated {count} times but has no designator")]
    MissingDesignator { sheet: String, count: u32 },

    #[error("Cycle detected in sheet hierarchy at '{0}'")]
    CyclicHierarchy(String),

    #[error("Generated JSON for '{path}' was not available after {attempts} attempts")]
    GenerationTimeout { path: String, attempts: u32 },

    #[error("No matching device sheet found for '{0}' in the project or design reuse repositories")]
    DeviceSheetNotFound(String),

    #[error("Variant '{name}' not found in project file. Available variants: {}", .available.join(", "))]
    VariantNotFound { name: String, available: Vec<String> },

    #[error("Variants are not supported for {0} projects")]
    VariantUnsupported(Tool),

    #[error("Unsupported project file '{0}': expected a .PrjPcb, .DSN or .SDAX file")]
    UnsupportedProjectFile(String),

    #[error("Group-by column '{0}' is not one of the mapped columns")]
    UnknownGroupByColumn(String),

    #[error("Malformed generated JSON for '{path}': {source}")]
    MalformedDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project file is not valid UTF-8")]
    ProjectEncoding(#[from] std::string::FromUtf8Error),

    #[error("Invalid project file at line {line}: {message}")]
    ProjectSyntax { line: usize, message: String },

    #[error("Failed to write BOM as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type Result<T> = std::result::Result<T, Error>;
