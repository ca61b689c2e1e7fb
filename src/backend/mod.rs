//! Code generators. Each backend walks the schema once through [`crate::walk`]
//! and renders source text with `std::fmt::Write`; none of them assigns indices
//! or orders fields on its own.

pub mod client;
pub mod device;
pub mod migration;

use crate::ast::Schema;
use crate::lint::{lint, LintMessage, Severity};

pub use client::{generate_client, WIRE_RUNTIME_TS};
pub use device::{generate_device, DeviceMode};
pub use migration::{generate_migration, MigrationModules};

/// Why a backend refused to produce an artifact.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("schema `{schema}` has {} lint error(s); first: {}", .findings.len(), first_finding(.findings))]
    Invalid {
        schema: String,
        findings: Vec<LintMessage>,
    },
    #[error("formatting generated source: {0}")]
    Fmt(#[from] std::fmt::Error),
}

fn first_finding(findings: &[LintMessage]) -> String {
    findings.first().map(|m| m.to_string()).unwrap_or_default()
}

/// Run the lint and refuse on any error-level finding. Warnings are logged.
pub fn ensure_valid(schema: &Schema) -> Result<(), GenerateError> {
    let (errors, warnings): (Vec<_>, Vec<_>) = lint(schema)
        .into_iter()
        .partition(|m| m.severity == Severity::Error);
    for w in &warnings {
        log::warn!("{}", w);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GenerateError::Invalid {
            schema: schema.name.clone(),
            findings: errors,
        })
    }
}

/// `home_ssid` -> `HomeSsid`.
pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    for part in snake.split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Concatenated CamelCase of a node path; the root (empty path) is `Root`.
pub fn camel_path(path: &[String]) -> String {
    if path.is_empty() {
        return "Root".to_string();
    }
    path.iter().map(|p| camel_case(p)).collect()
}

/// Name of the borrowed view generated for a group.
pub fn view_name(path: &[String]) -> String {
    format!("{}View", camel_path(path))
}
