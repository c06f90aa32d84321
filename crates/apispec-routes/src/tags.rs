//! Lazy interpretation of Go struct tags, against a closed set of
//! recognized validation rules. The extractor (C3) keeps tag text raw in
//! [`apispec_core::Field::tag`]; this module is where it finally gets read,
//! once, when the schema synthesizer lowers a field.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+):"((?:[^"\\]|\\.)*)""#).unwrap());

/// One `key:"value"` pair pulled out of a raw struct tag, e.g. `json` or
/// `validate`.
fn tag_value<'a>(raw: &'a str, key: &str) -> Option<&'a str> {
    TAG_PAIR
        .captures_iter(raw)
        .find(|c| &c[1] == key)
        .map(|c| c.get(2).unwrap().as_str())
}

/// The serialized field name and `omitempty`-ness from a `json:"..."` tag.
/// `None` name means "use the Go field name"; `Some(None)` (skip) is
/// signalled by returning `JsonTag::Skip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonTag {
    /// Field participates under this name (`None` => fall back to the Go
    /// field name), with the given `omitempty` flag.
    Named { name: Option<String>, omitempty: bool },
    /// `json:"-"`: the field never appears in the serialized form.
    Skip,
}

pub fn parse_json_tag(raw: Option<&str>) -> JsonTag {
    let Some(raw) = raw else {
        return JsonTag::Named {
            name: None,
            omitempty: false,
        };
    };
    let Some(value) = tag_value(raw, "json") else {
        return JsonTag::Named {
            name: None,
            omitempty: false,
        };
    };
    let mut parts = value.split(',');
    let name = parts.next().unwrap_or("");
    if name == "-" && value == "-" {
        return JsonTag::Skip;
    }
    let omitempty = parts.any(|opt| opt == "omitempty");
    JsonTag::Named {
        name: if name.is_empty() { None } else { Some(name.to_string()) },
        omitempty,
    }
}

/// The closed set of validation rules recognized here, parsed out of a
/// `validate:"..."` tag (the go-playground/validator convention — the
/// dominant one in the Go ecosystem). Unknown rules are silently ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRules {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub len: Option<u64>,
    pub email: bool,
    pub url: bool,
    pub uuid: bool,
    pub regexp: Option<String>,
    pub oneof: Option<Vec<String>>,
}

pub fn parse_validate_tag(raw: Option<&str>) -> ValidationRules {
    let mut rules = ValidationRules::default();
    let Some(raw) = raw else { return rules };
    let Some(value) = tag_value(raw, "validate") else {
        return rules;
    };

    for rule in split_top_level(value) {
        let (name, arg) = match rule.split_once('=') {
            Some((n, a)) => (n, Some(a)),
            None => (rule.as_str(), None),
        };
        match name {
            "required" => rules.required = true,
            "email" => rules.email = true,
            "url" | "uri" => rules.url = true,
            "uuid" | "uuid4" => rules.uuid = true,
            "min" => rules.min = arg.and_then(|a| a.parse().ok()),
            "max" => rules.max = arg.and_then(|a| a.parse().ok()),
            "len" => rules.len = arg.and_then(|a| a.parse().ok()),
            "regexp" => rules.regexp = arg.map(|a| a.to_string()),
            "oneof" => {
                rules.oneof = arg.map(|a| a.split_whitespace().map(|s| s.to_string()).collect());
            }
            _ => {}
        }
    }

    rules
}

/// Splits a validator tag's rule list on top-level commas only — `oneof`
/// and `regexp` arguments may themselves legitimately contain no commas in
/// practice for this engine's purposes, but the split still needs to not
/// explode on an empty segment.
fn split_top_level(value: &str) -> Vec<String> {
    value.split(',').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_name_and_omitempty() {
        let tag = parse_json_tag(Some(r#"json:"user_name,omitempty" validate:"required""#));
        assert_eq!(
            tag,
            JsonTag::Named {
                name: Some("user_name".to_string()),
                omitempty: true,
            }
        );
    }

    #[test]
    fn json_dash_skips_field() {
        assert_eq!(parse_json_tag(Some(r#"json:"-""#)), JsonTag::Skip);
    }

    #[test]
    fn missing_tag_falls_back_to_go_name() {
        assert_eq!(
            parse_json_tag(None),
            JsonTag::Named {
                name: None,
                omitempty: false,
            }
        );
    }

    #[test]
    fn parses_validation_rules() {
        let rules = parse_validate_tag(Some(r#"validate:"required,min=3,max=50,oneof=a b c""#));
        assert!(rules.required);
        assert_eq!(rules.min, Some(3.0));
        assert_eq!(rules.max, Some(50.0));
        assert_eq!(rules.oneof, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));
    }

    #[test]
    fn unknown_rule_is_ignored() {
        let rules = parse_validate_tag(Some(r#"validate:"required,frobnicate=9""#));
        assert!(rules.required);
    }
}
