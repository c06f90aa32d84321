//! Bundled [`FrameworkConfig`] values for the three router styles the engine
//! ships recognizing out of the box, plus the `go.mod`-sniffing heuristic
//! that picks one when the caller doesn't supply `--framework`. Loading a
//! user-authored configuration from disk is this crate's job too (the engine
//! only ever sees a [`FrameworkConfig`] value), but these three exist so the
//! CLI has a sane default and the route extractor has something to run
//! against without requiring one.

use std::path::Path;

use apispec_core::{CallPattern, Capture, Constraint, FrameworkConfig, Patterns};

/// One of the three bundled router styles, or a caller-identified default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    NetHttp,
    Gin,
    Chi,
}

impl Framework {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "net/http" | "nethttp" | "stdlib" => Some(Framework::NetHttp),
            "gin" => Some(Framework::Gin),
            "chi" => Some(Framework::Chi),
            _ => None,
        }
    }

    pub fn config(self) -> FrameworkConfig {
        match self {
            Framework::NetHttp => net_http_config(),
            Framework::Gin => gin_config(),
            Framework::Chi => chi_config(),
        }
    }
}

/// Inspects `go.mod`'s require list for a known router import path and picks
/// the matching bundled configuration. Falls back to `net/http` — every Go
/// module can register routes against the standard library's `ServeMux`
/// even when it also imports a third-party router for something else.
pub fn detect(module_root: &Path) -> Framework {
    let Ok(contents) = std::fs::read_to_string(module_root.join("go.mod")) else {
        return Framework::NetHttp;
    };
    if contents.contains("github.com/gin-gonic/gin") {
        Framework::Gin
    } else if contents.contains("github.com/go-chi/chi") {
        Framework::Chi
    } else {
        Framework::NetHttp
    }
}

fn pattern(name: &str, all_of: Vec<Constraint>, captures: Vec<Capture>) -> CallPattern {
    CallPattern {
        name: name.to_string(),
        all_of,
        captures,
    }
}

fn capture(name: &str, source: &str) -> Capture {
    Capture {
        name: name.to_string(),
        source: source.to_string(),
    }
}

/// One `route_registrations` pattern per HTTP verb a framework's router
/// exposes as its own method name (`router.GET(path, handler)`). `go_method`
/// is the Go identifier the regex matches against the call's fully-qualified
/// name; `http_method` is what ends up in the `method` capture and thus the
/// OpenAPI operation. The two only coincide for gin, which (unusually for
/// exported Go identifiers) spells its router methods in all-caps.
fn verb_pattern(go_method: &str, http_method: &str, label: &str) -> CallPattern {
    pattern(
        &format!("{label}_{}", http_method.to_lowercase()),
        vec![Constraint::FunctionName {
            regex: format!(r"\.{go_method}$"),
        }],
        vec![
            capture("method", &format!("literal:{http_method}")),
            capture("path", "0"),
            capture("handler", "1"),
        ],
    )
}

const VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// chi's `Router` interface spells these the ordinary Go-exported way
/// (`Get`, `Post`, ...), not all-caps like gin.
const CHI_VERBS: &[(&str, &str)] = &[
    ("Get", "GET"),
    ("Post", "POST"),
    ("Put", "PUT"),
    ("Patch", "PATCH"),
    ("Delete", "DELETE"),
    ("Head", "HEAD"),
    ("Options", "OPTIONS"),
];

/// `net/http`'s `ServeMux`. `HandleFunc`/`Handle` take one pattern string
/// with no separate method argument — Go 1.22's `"METHOD /path"` syntax
/// would need splitting a captured string, which the capture language can't
/// express, so every registration is treated as `GET`. Documented as an
/// open question rather than silently dropped.
fn net_http_config() -> FrameworkConfig {
    let mut config = FrameworkConfig::default();
    config.patterns = Patterns {
        router_constructors: vec![pattern(
            "new_servemux",
            vec![Constraint::FunctionName {
                regex: r"net/http\.NewServeMux$".to_string(),
            }],
            vec![],
        )],
        mount: vec![],
        group: vec![],
        route_registrations: vec![pattern(
            "handle_func",
            vec![Constraint::FunctionName {
                regex: r"\.HandleFunc$".to_string(),
            }],
            vec![
                capture("method", "literal:GET"),
                capture("path", "0"),
                capture("handler", "1"),
            ],
        )],
        request_decoders: vec![pattern(
            "json_decode",
            vec![
                Constraint::FunctionName {
                    regex: r"\.Decode$".to_string(),
                },
                Constraint::ReceiverType {
                    regex: r"encoding/json\.Decoder$".to_string(),
                    version_agnostic: false,
                },
            ],
            vec![capture("type", "0")],
        )],
        response_encoders: vec![pattern(
            "json_encode",
            vec![
                Constraint::FunctionName {
                    regex: r"\.Encode$".to_string(),
                },
                Constraint::ReceiverType {
                    regex: r"encoding/json\.Encoder$".to_string(),
                    version_agnostic: false,
                },
            ],
            vec![capture("status-code", "literal:200"), capture("body-type", "0")],
        )],
    };
    config
}

/// `github.com/gin-gonic/gin`. A `RouterGroup` is itself a router, so
/// there's no separate mount step — `Group` both creates and links a child
/// in one call, which the extractor's prefix map already treats correctly
/// since `group`'s `result_identity` fallback covers an unassigned chained
/// group the same way it covers a mount.
fn gin_config() -> FrameworkConfig {
    let mut config = FrameworkConfig::default();
    config.patterns = Patterns {
        router_constructors: vec![
            pattern(
                "gin_default",
                vec![Constraint::FunctionName {
                    regex: r"github\.com/gin-gonic/gin\.Default$".to_string(),
                }],
                vec![],
            ),
            pattern(
                "gin_new",
                vec![Constraint::FunctionName {
                    regex: r"github\.com/gin-gonic/gin\.New$".to_string(),
                }],
                vec![],
            ),
        ],
        mount: vec![],
        group: vec![pattern(
            "gin_group",
            vec![Constraint::FunctionName {
                regex: r"\.Group$".to_string(),
            }],
            vec![capture("prefix", "0")],
        )],
        route_registrations: VERBS.iter().map(|v| verb_pattern(v, v, "gin")).collect(),
        request_decoders: vec![pattern(
            "gin_bind_json",
            vec![Constraint::FunctionName {
                regex: r"\.(ShouldBindJSON|BindJSON)$".to_string(),
            }],
            vec![capture("type", "0")],
        )],
        response_encoders: vec![pattern(
            "gin_json",
            vec![Constraint::FunctionName {
                regex: r"\.JSON$".to_string(),
            }],
            vec![capture("status-code", "0"), capture("body-type", "1")],
        )],
    };
    config
}

/// `github.com/go-chi/chi`. `Mount` is the one place chi's own API hands a
/// whole child router across a call boundary, which is exactly the "options
/// pattern" scenario this extractor is built to survive — the child's
/// identity is read off `Mount`'s second argument, not off anything assigned
/// in the caller. Middleware-only grouping via `Route`/`Group`'s closure
/// argument isn't modeled: the sub-router it hands the closure is a function
/// parameter, not a value this pattern language can follow.
fn chi_config() -> FrameworkConfig {
    let mut config = FrameworkConfig::default();
    config.patterns = Patterns {
        router_constructors: vec![pattern(
            "chi_new_router",
            vec![Constraint::FunctionName {
                regex: r"github\.com/go-chi/chi(/v5)?\.NewRouter$".to_string(),
            }],
            vec![],
        )],
        mount: vec![pattern(
            "chi_mount",
            vec![Constraint::FunctionName {
                regex: r"\.Mount$".to_string(),
            }],
            vec![capture("prefix", "0"), capture("child-router", "1")],
        )],
        group: vec![],
        route_registrations: CHI_VERBS.iter().map(|(go, http)| verb_pattern(go, http, "chi")).collect(),
        request_decoders: vec![pattern(
            "json_decode",
            vec![
                Constraint::FunctionName {
                    regex: r"\.Decode$".to_string(),
                },
                Constraint::ReceiverType {
                    regex: r"encoding/json\.Decoder$".to_string(),
                    version_agnostic: false,
                },
            ],
            vec![capture("type", "0")],
        )],
        response_encoders: vec![pattern(
            "json_encode",
            vec![
                Constraint::FunctionName {
                    regex: r"\.Encode$".to_string(),
                },
                Constraint::ReceiverType {
                    regex: r"encoding/json\.Encoder$".to_string(),
                    version_agnostic: false,
                },
            ],
            vec![capture("status-code", "literal:200"), capture("body-type", "0")],
        )],
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_framework_names_case_insensitively() {
        assert_eq!(Framework::parse("Gin"), Some(Framework::Gin));
        assert_eq!(Framework::parse("CHI"), Some(Framework::Chi));
        assert_eq!(Framework::parse("net/http"), Some(Framework::NetHttp));
        assert_eq!(Framework::parse("unknown"), None);
    }

    #[test]
    fn detect_defaults_to_net_http_without_a_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect(dir.path()), Framework::NetHttp);
    }

    #[test]
    fn detect_recognizes_gin_from_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example\n\nrequire github.com/gin-gonic/gin v1.9.0\n").unwrap();
        assert_eq!(detect(dir.path()), Framework::Gin);
    }

    #[test]
    fn gin_config_has_one_route_pattern_per_verb() {
        let config = gin_config();
        assert_eq!(config.patterns.route_registrations.len(), VERBS.len());
    }

    #[test]
    fn chi_verbs_match_title_case_go_methods_not_gins_all_caps() {
        let config = chi_config();
        let get = config
            .patterns
            .route_registrations
            .iter()
            .find(|p| p.name == "chi_get")
            .expect("a chi_get pattern");
        match &get.all_of[0] {
            Constraint::FunctionName { regex } => assert_eq!(regex, r"\.Get$"),
            other => panic!("expected a FunctionName constraint, got {other:?}"),
        }
        let method_capture = get.captures.iter().find(|c| c.name == "method").unwrap();
        assert_eq!(method_capture.source, "literal:GET");
    }
}
