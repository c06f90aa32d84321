use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `info{title,description,version,terms,contact{name,url,email},license{name,url}}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct License {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocInfo {
    #[serde(default = "DocInfo::default_title")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "DocInfo::default_version")]
    pub version: String,
    #[serde(default)]
    pub terms_of_service: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub license: Option<License>,
    #[serde(default)]
    pub servers: Vec<String>,
}

impl DocInfo {
    fn default_title() -> String {
        "API".to_string()
    }
    fn default_version() -> String {
        "0.0.0".to_string()
    }
}

impl Default for DocInfo {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            description: None,
            version: Self::default_version(),
            terms_of_service: None,
            contact: None,
            license: None,
            servers: Vec::new(),
        }
    }
}

/// Per-tree resource budgets, with the conservative defaults documented
/// on each field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct Limits {
    #[serde(default = "Limits::default_max_nodes_per_tree")]
    pub max_nodes_per_tree: usize,
    #[serde(default = "Limits::default_max_children_per_node")]
    pub max_children_per_node: usize,
    #[serde(default = "Limits::default_max_args_per_function")]
    pub max_args_per_function: usize,
    #[serde(default = "Limits::default_max_nested_args_depth")]
    pub max_nested_args_depth: usize,
    #[serde(default = "Limits::default_max_recursion_depth")]
    pub max_recursion_depth: usize,
}

impl Limits {
    fn default_max_nodes_per_tree() -> usize {
        50_000
    }
    fn default_max_children_per_node() -> usize {
        500
    }
    fn default_max_args_per_function() -> usize {
        100
    }
    fn default_max_nested_args_depth() -> usize {
        100
    }
    fn default_max_recursion_depth() -> usize {
        10
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nodes_per_tree: Self::default_max_nodes_per_tree(),
            max_children_per_node: Self::default_max_children_per_node(),
            max_args_per_function: Self::default_max_args_per_function(),
            max_nested_args_depth: Self::default_max_nested_args_depth(),
            max_recursion_depth: Self::default_max_recursion_depth(),
        }
    }
}

/// `analysis{include-packages,exclude-packages,exclude-tests,exclude-mocks,
/// analyze-framework-deps,auto-include-framework-packages}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Analysis {
    #[serde(default)]
    pub include_packages: Vec<String>,
    #[serde(default)]
    pub exclude_packages: Vec<String>,
    #[serde(default = "Analysis::default_true")]
    pub exclude_tests: bool,
    #[serde(default)]
    pub exclude_mocks: bool,
    #[serde(default)]
    pub analyze_framework_deps: bool,
    #[serde(default)]
    pub auto_include_framework_packages: bool,
}

impl Analysis {
    fn default_true() -> bool {
        true
    }
}

/// One constraint kind recognized by the pattern matcher. A
/// [`CallPattern`] is an AND of these; an OR is expressed by supplying
/// several `CallPattern`s under the same section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Constraint {
    /// Regex against the fully-qualified callee name.
    FunctionName { regex: String },
    /// Regex against the receiver's concrete or interface type name. When
    /// `version_agnostic` is set, a trailing `/v<digits>` is stripped from
    /// both the pattern and the candidate before matching.
    ReceiverType {
        regex: String,
        #[serde(default)]
        version_agnostic: bool,
    },
    /// Constrains one positional (or variadic, via `index = -1`) argument.
    Argument {
        index: i32,
        #[serde(default)]
        value_regex: Option<String>,
    },
    /// Constrains one of the call's type arguments by position.
    TypeArgument { index: u32, regex: String },
}

/// A capture a successful match binds for downstream consumption —
/// `method`, `path`, `handler`, `request-type`, `status-code`, etc.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Capture {
    pub name: String,
    /// Which constituent of the match this capture reads from: an argument
    /// index, `"receiver"`, `"type-arg:N"`, or a literal constant supplied
    /// inline (`"literal:GET"`).
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct CallPattern {
    pub name: String,
    #[serde(default)]
    pub all_of: Vec<Constraint>,
    #[serde(default)]
    pub captures: Vec<Capture>,
}

/// `patterns{routers,mounts,groups,routes,request-decoders,response-encoders}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Patterns {
    #[serde(default)]
    pub router_constructors: Vec<CallPattern>,
    #[serde(default)]
    pub mount: Vec<CallPattern>,
    #[serde(default)]
    pub group: Vec<CallPattern>,
    #[serde(default)]
    pub route_registrations: Vec<CallPattern>,
    #[serde(default)]
    pub request_decoders: Vec<CallPattern>,
    #[serde(default)]
    pub response_encoders: Vec<CallPattern>,
}

/// `path-param-syntax`: token mapping between a framework's placeholder
/// syntax and OpenAPI's `{name}` form.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct PathParamSyntax {
    /// Regex with one capture group extracting the parameter name, e.g.
    /// `r":([A-Za-z_][A-Za-z0-9_]*)"` for `:name`-style params.
    pub param_regex: String,
}

impl Default for PathParamSyntax {
    fn default() -> Self {
        Self {
            param_regex: r":([A-Za-z_][A-Za-z0-9_]*)".to_string(),
        }
    }
}

/// `type-overrides`: source type (by qualified name) to an inline OpenAPI
/// schema fragment (raw JSON, passed through to the document verbatim).
pub type TypeOverrides = BTreeMap<String, serde_json::Value>;

/// The full per-framework configuration value external callers construct.
/// `analysis.exclude_packages`/`include_packages` plus the pattern sections
/// are the only parts the engine reads; loading this from a file on disk is
/// the CLI's job, not the engine's.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub info: DocInfo,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub patterns: Patterns,
    #[serde(default)]
    pub path_param_syntax: PathParamSyntax,
    #[serde(default)]
    pub type_overrides: TypeOverrides,
}
