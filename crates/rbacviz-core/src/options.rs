//! Visualizer options and their validation
//!
//! Options arrive as plain strings from the caller (typically CLI flags).
//! They are validated up front so a bad value fails before any cluster I/O.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result, ALL_NAMESPACES, DEFAULT_EXCLUDED_NAMESPACES, DEFAULT_OUTFORMAT};

/// Maximum length of a namespace name (DNS-1123 label)
const MAX_NAMESPACE_LEN: usize = 63;

/// Raw options as supplied by the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualizeOptions {
    /// Comma-delimited namespaces to include, or `*` for all
    pub included_namespaces: String,
    /// Comma-delimited namespaces to exclude
    pub excluded_namespaces: String,
    /// `dot` or `html`
    pub outformat: String,
    /// Prefix the graph with a legend
    pub show_legend: bool,
    /// Render access rules of each role
    pub show_rules: bool,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            included_namespaces: ALL_NAMESPACES.to_string(),
            excluded_namespaces: DEFAULT_EXCLUDED_NAMESPACES.to_string(),
            outformat: DEFAULT_OUTFORMAT.to_string(),
            show_legend: false,
            show_rules: true,
        }
    }
}

/// Options after validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Namespace include/exclude sets
    pub filter: NamespaceFilter,
    /// Output format
    pub format: OutputFormat,
    /// Prefix the graph with a legend
    pub show_legend: bool,
    /// Render access rules of each role
    pub show_rules: bool,
}

impl VisualizeOptions {
    /// Validate every option, returning a configuration error on the first bad one
    pub fn validate(&self) -> Result<ResolvedOptions> {
        let format = self.outformat.parse()?;
        let filter = NamespaceFilter::parse(&self.included_namespaces, &self.excluded_namespaces)?;
        Ok(ResolvedOptions {
            filter,
            format,
            show_legend: self.show_legend,
            show_rules: self.show_rules,
        })
    }
}

/// Supported output formats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw Graphviz DOT text
    Dot,
    /// Self-contained HTML page rendering the DOT client-side
    #[default]
    Html,
}

impl OutputFormat {
    /// Name as accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Dot => "dot",
            OutputFormat::Html => "html",
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot" => Ok(OutputFormat::Dot),
            "html" => Ok(OutputFormat::Html),
            other => Err(Error::configuration_for_field(
                "outformat",
                format!("unsupported output format '{}', expected 'dot' or 'html'", other),
            )),
        }
    }
}

/// Namespace include/exclude sets
///
/// Exclude always wins over include.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceFilter {
    /// `None` means every namespace
    include: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
}

impl Default for NamespaceFilter {
    fn default() -> Self {
        Self {
            include: None,
            exclude: BTreeSet::from([DEFAULT_EXCLUDED_NAMESPACES.to_string()]),
        }
    }
}

impl NamespaceFilter {
    /// Parse comma-delimited include and exclude expressions
    pub fn parse(include: &str, exclude: &str) -> Result<Self> {
        let included = parse_list("include-namespaces", include)?;
        if included.is_empty() {
            return Err(Error::configuration_for_field(
                "include-namespaces",
                "at least one namespace or '*' is required",
            ));
        }

        let excluded = parse_list("exclude-namespaces", exclude)?;
        if excluded.contains(ALL_NAMESPACES) {
            return Err(Error::configuration_for_field(
                "exclude-namespaces",
                "'*' is only meaningful in the include set",
            ));
        }

        let include = if included.contains(ALL_NAMESPACES) {
            None
        } else {
            Some(included)
        };

        Ok(Self {
            include,
            exclude: excluded,
        })
    }

    /// Whether nodes in `namespace` are kept
    pub fn allows(&self, namespace: &str) -> bool {
        if self.exclude.contains(namespace) {
            return false;
        }
        match &self.include {
            None => true,
            Some(set) => set.contains(namespace),
        }
    }

    /// Whether the include set is the wildcard
    pub fn includes_all(&self) -> bool {
        self.include.is_none()
    }

    /// Excluded namespaces, sorted
    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.exclude.iter().map(String::as_str)
    }
}

fn parse_list(field: &str, raw: &str) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if entry != ALL_NAMESPACES && !is_dns_label(entry) {
            return Err(Error::configuration_for_field(
                field,
                format!("'{}' is not a valid namespace name", entry),
            ));
        }
        set.insert(entry.to_string());
    }
    Ok(set)
}

/// RFC 1123 label: lowercase alphanumerics and '-', alphanumeric at both ends
fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAMESPACE_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}
