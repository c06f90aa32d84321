//! C9: merges routes (C7) and the schema map (C8) into a pure-data OpenAPI
//! 3.1 document. Serialization of the result is the caller's job — the CLI
//! prints it with `serde_json::to_string_pretty`.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use apispec_core::{Contact, DocInfo, License};

use crate::routes::Route;
use crate::schema::{InlineSchema, Schema, SchemaSynthesizer};

static PATH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub openapi: String,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    pub components: Components,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl From<&DocInfo> for Info {
    fn from(info: &DocInfo) -> Self {
        Self {
            title: info.title.clone(),
            description: info.description.clone(),
            version: info.version.clone(),
            terms_of_service: info.terms_of_service.clone(),
            contact: info.contact.clone(),
            license: info.license.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: &str) -> Option<&mut Option<Operation>> {
        Some(match method {
            "GET" => &mut self.get,
            "POST" => &mut self.post,
            "PUT" => &mut self.put,
            "PATCH" => &mut self.patch,
            "DELETE" => &mut self.delete,
            "HEAD" => &mut self.head,
            "OPTIONS" => &mut self.options,
            "TRACE" => &mut self.trace,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Components {
    pub schemas: BTreeMap<String, InlineSchema>,
}

/// Merges `routes` (grouped by path, methods becoming operations) and
/// `synth`'s accumulated schema map into one document, applying `info`.
/// Consumes `synth` since nothing reads schemas after assembly.
pub fn assemble(info: &DocInfo, routes: &[Route], synth: SchemaSynthesizer<'_>) -> Document {
    let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();

    for route in routes {
        let Some(slot) = paths.entry(route.path.clone()).or_default().slot(&route.method) else {
            continue;
        };

        let parameters = PATH_PARAM
            .captures_iter(&route.path)
            .map(|c| Parameter {
                name: c[1].to_string(),
                location: "path".to_string(),
                required: true,
                schema: Schema::inline(InlineSchema {
                    ty: Some("string".to_string()),
                    ..Default::default()
                }),
            })
            .collect();

        let request_body = route.request_type.map(|ty| {
            let mut content = BTreeMap::new();
            content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: synth.schema_for(ty),
                },
            );
            RequestBody { required: true, content }
        });

        let mut responses = BTreeMap::new();
        for response in &route.responses {
            let schema = response.body_type.map(|ty| synth.schema_for(ty)).unwrap_or_else(Schema::empty_object);
            let mut content = BTreeMap::new();
            content.insert("application/json".to_string(), MediaType { schema });
            responses.insert(
                response.status_code.to_string(),
                Response {
                    description: status_description(response.status_code).to_string(),
                    content: Some(content),
                },
            );
        }

        *slot = Some(Operation {
            operation_id: route.operation_id.clone(),
            parameters,
            request_body,
            responses,
        });
    }

    Document {
        openapi: "3.1.0".to_string(),
        info: Info::from(info),
        paths,
        components: Components {
            schemas: synth.into_schemas(),
        },
        servers: info.servers.iter().map(|url| Server { url: url.clone() }).collect(),
    }
}

fn status_description(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "Response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::ResponseSpec;
    use apispec_core::{MetadataStore, Position, TypeOverrides};

    fn pos(store: &MetadataStore) -> Position {
        Position::new(store.pool.intern("f.go"), 1, 1)
    }

    #[test]
    fn empty_module_yields_empty_paths_and_schemas() {
        let store = MetadataStore::new();
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let info = DocInfo::default();
        let doc = assemble(&info, &[], synth);
        assert!(doc.paths.is_empty());
        assert!(doc.components.schemas.is_empty());
        assert_eq!(doc.info.title, "API");
    }

    #[test]
    fn path_param_becomes_required_string_parameter() {
        let store = MetadataStore::new();
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let info = DocInfo::default();
        let route = Route {
            method: "GET".to_string(),
            path: "/users/{id}".to_string(),
            operation_id: "getUser".to_string(),
            handler: None,
            request_type: None,
            responses: vec![ResponseSpec {
                status_code: 200,
                body_type: None,
            }],
            position: pos(&store),
        };
        let doc = assemble(&info, &[route], synth);
        let op = doc.paths["/users/{id}"].get.as_ref().expect("get operation");
        assert_eq!(op.parameters.len(), 1);
        assert_eq!(op.parameters[0].name, "id");
        assert!(op.parameters[0].required);
        assert!(op.responses.contains_key("200"));
    }
}
