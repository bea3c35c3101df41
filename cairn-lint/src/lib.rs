//! Cairn Lint
//!
//! Static checks over resource definitions, run before anything talks to a
//! cloud API. Each check has a stable code so it can be selected or silenced:
//!
//! - `S0xx` - attribute flag combinations a schema must never have
//! - `R0xx` - resource-level consistency (update support, identifiers)
//! - `N0xx` - attribute naming
//! - `T001` - tagging support
//! - `D001` - documentation

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use cairn_core::schema::{AttributeSchema, AttributeType};
use cairn_provider_awscc::ResourceDefinition;
use cairn_provider_awscc::schemas::TAGS_ATTRIBUTE;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static SNAKE_CASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").unwrap());

/// Names with a meaning of their own in configuration
pub const RESERVED_NAMES: &[&str] = &[
    "connection",
    "count",
    "depends_on",
    "id",
    "lifecycle",
    "provider",
    "provisioner",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LintError {
    #[error("unknown check '{0}'")]
    UnknownCheck(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    S001,
    S002,
    S003,
    S004,
    S005,
    S006,
    R001,
    R002,
    R003,
    N001,
    N002,
    T001,
    D001,
}

impl Check {
    pub const ALL: [Check; 13] = [
        Check::S001,
        Check::S002,
        Check::S003,
        Check::S004,
        Check::S005,
        Check::S006,
        Check::R001,
        Check::R002,
        Check::R003,
        Check::N001,
        Check::N002,
        Check::T001,
        Check::D001,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Check::S001 => "S001",
            Check::S002 => "S002",
            Check::S003 => "S003",
            Check::S004 => "S004",
            Check::S005 => "S005",
            Check::S006 => "S006",
            Check::R001 => "R001",
            Check::R002 => "R002",
            Check::R003 => "R003",
            Check::N001 => "N001",
            Check::N002 => "N002",
            Check::T001 => "T001",
            Check::D001 => "D001",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Check {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Check::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| LintError::UnknownCheck(s.trim().to_string()))
    }
}

impl Serialize for Check {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Parse a comma-separated list of check codes, e.g. "S001,r002"
pub fn parse_checks(list: &str) -> Result<BTreeSet<Check>, LintError> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Check::from_str)
        .collect()
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub check: Check,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}.{}: {}", self.resource_type, attr, self.message),
            None => write!(f, "{}: {}", self.resource_type, self.message),
        }
    }
}

/// Which checks to run
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Run only these, when non-empty
    pub only: BTreeSet<Check>,
    pub exclude: BTreeSet<Check>,
}

impl Selection {
    pub fn is_enabled(&self, check: Check) -> bool {
        (self.only.is_empty() || self.only.contains(&check)) && !self.exclude.contains(&check)
    }
}

struct Findings<'a> {
    resource_type: &'a str,
    selection: &'a Selection,
    diagnostics: Vec<Diagnostic>,
}

impl Findings<'_> {
    fn report(&mut self, check: Check, attribute: Option<&str>, message: impl Into<String>) {
        if self.selection.is_enabled(check) {
            self.diagnostics.push(Diagnostic {
                check,
                resource_type: self.resource_type.to_string(),
                attribute: attribute.map(str::to_string),
                message: message.into(),
            });
        }
    }
}

/// Lint every definition, in order
pub fn lint_all(definitions: &[ResourceDefinition], selection: &Selection) -> Vec<Diagnostic> {
    definitions
        .iter()
        .flat_map(|d| lint_definition(d, selection))
        .collect()
}

pub fn lint_definition(definition: &ResourceDefinition, selection: &Selection) -> Vec<Diagnostic> {
    let mut findings = Findings {
        resource_type: definition.resource_type,
        selection,
        diagnostics: Vec::new(),
    };

    let attributes = definition.schema.sorted_attributes();
    for attr in &attributes {
        if RESERVED_NAMES.contains(&attr.name.as_str()) {
            findings.report(Check::N002, Some(&attr.name), "name is reserved");
        }
        check_attribute(&mut findings, &attr.name, attr);
    }

    if definition.schema.description.as_deref().is_none_or(str::is_empty) {
        findings.report(Check::D001, None, "missing description");
    }

    check_update_support(&mut findings, definition, &attributes);
    check_identifier(&mut findings, definition);
    check_tags(&mut findings, definition);

    findings.diagnostics
}

/// Flag, name and description checks for `attr` and any struct fields
/// beneath it, reported under the dotted `path`
fn check_attribute(findings: &mut Findings<'_>, path: &str, attr: &AttributeSchema) {
    check_flags(findings, path, attr);
    check_name(findings, path, &attr.name);
    if attr.description.as_deref().is_none_or(str::is_empty) {
        findings.report(Check::D001, Some(path), "missing description");
    }
    for field in struct_fields(&attr.attr_type) {
        check_attribute(findings, &format!("{}.{}", path, field.name), field);
    }
}

/// Fields of a struct type, looking through lists, maps and custom types
fn struct_fields(attr_type: &AttributeType) -> &[AttributeSchema] {
    match attr_type {
        AttributeType::Struct { fields, .. } => fields,
        AttributeType::List(inner) | AttributeType::Map(inner) => struct_fields(inner),
        AttributeType::Custom { base, .. } => struct_fields(base),
        _ => &[],
    }
}

fn check_flags(findings: &mut Findings<'_>, path: &str, attr: &AttributeSchema) {
    let name = Some(path);

    if attr.optional && attr.required {
        findings.report(Check::S001, name, "Optional or Required must be set, not both");
    }
    if attr.required && attr.computed {
        findings.report(Check::S002, name, "Cannot be both Required and Computed");
    }
    if !attr.required && !attr.optional && !attr.computed {
        findings.report(
            Check::S003,
            name,
            "One of Optional, Required, or Computed must be set",
        );
    }
    if attr.computed && attr.default.is_some() {
        findings.report(Check::S004, name, "Default must be unset if Computed");
    }
    if attr.required && attr.default.is_some() {
        findings.report(Check::S005, name, "Default cannot be set with Required");
    }
    if attr.force_new && attr.is_computed_only() {
        findings.report(Check::S006, name, "ForceNew has no effect on a computed-only attribute");
    }
}

fn check_name(findings: &mut Findings<'_>, path: &str, name: &str) {
    if !SNAKE_CASE.is_match(name) {
        findings.report(
            Check::N001,
            Some(path),
            "name may only contain lowercase alphanumeric characters and underscores",
        );
    }
}

fn check_update_support(
    findings: &mut Findings<'_>,
    definition: &ResourceDefinition,
    attributes: &[&AttributeSchema],
) {
    let in_place: Vec<&str> = attributes
        .iter()
        .filter(|a| a.is_settable() && !a.force_new)
        .map(|a| a.name.as_str())
        .collect();

    if definition.updatable && in_place.is_empty() {
        findings.report(
            Check::R001,
            None,
            "Update is superfluous: every settable attribute is ForceNew",
        );
    }
    if !definition.updatable && !in_place.is_empty() {
        findings.report(
            Check::R002,
            None,
            format!(
                "Update must be implemented: {} can change without ForceNew",
                in_place.join(", ")
            ),
        );
    }
}

fn check_identifier(findings: &mut Findings<'_>, definition: &ResourceDefinition) {
    let Some(name) = definition.identifier_attribute else {
        return;
    };
    match definition.schema.attributes.get(name) {
        None => findings.report(
            Check::R003,
            Some(name),
            "identifier attribute is not in the schema",
        ),
        Some(attr) if !attr.computed => findings.report(
            Check::R003,
            Some(name),
            "identifier attribute must be Computed",
        ),
        Some(_) => {}
    }
}

fn check_tags(findings: &mut Findings<'_>, definition: &ResourceDefinition) {
    if !definition.has_tags {
        return;
    }
    let well_formed = definition.schema.attributes.get(TAGS_ATTRIBUTE).is_some_and(|a| {
        a.optional
            && matches!(&a.attr_type, AttributeType::Map(inner) if matches!(**inner, AttributeType::String))
    });
    if !well_formed {
        findings.report(
            Check::T001,
            Some(TAGS_ATTRIBUTE),
            "tagged resource needs an optional Map<String> tags attribute",
        );
    }
}
