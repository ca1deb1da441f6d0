//! OpenAPI document loading and operation extraction.
//!
//! Only what the toolkit needs is modelled: servers, paths, operations,
//! parameters and JSON request bodies. Local `$ref`s into
//! `#/components/parameters` and `#/components/schemas` are resolved. A schema
//! is inlined at most once along any branch; a repeated reference collapses to
//! a bare object so recursive types stay small.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

const METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("Failed to read OpenAPI spec {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI spec is neither valid JSON ({json}) nor valid YAML ({yaml})")]
    Parse { json: String, yaml: String },

    #[error("Invalid OpenAPI spec: {0}")]
    Invalid(String),
}

/// Where a parameter is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
}

impl ParameterLocation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            _ => None,
        }
    }

    /// Key of the argument object grouping parameters of this location.
    pub fn arg_key(&self) -> &'static str {
        match self {
            Self::Path => "path_params",
            Self::Query => "query",
            Self::Header => "headers",
        }
    }
}

/// A single operation parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Value,
}

/// One HTTP operation of the API.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Tool-safe unique name
    pub name: String,
    pub method: String,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    /// JSON schema of the request body, if the operation takes one
    pub request_body: Option<Value>,
    pub body_required: bool,
}

/// A parsed OpenAPI document.
#[derive(Debug, Clone)]
pub struct OpenApiSpec {
    raw: Value,
    pub title: Option<String>,
    pub base_url: Option<String>,
}

impl OpenApiSpec {
    /// Read and parse a spec file.
    pub fn from_file(path: &Path) -> Result<Self, OpenApiError> {
        let raw = std::fs::read_to_string(path).map_err(|source| OpenApiError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_text(&raw)
    }

    /// Parse a spec from raw JSON or YAML text.
    pub fn from_text(text: &str) -> Result<Self, OpenApiError> {
        let raw: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| OpenApiError::Parse {
                json: json_err.to_string(),
                yaml: yaml_err.to_string(),
            })?,
        };

        if !raw.is_object() {
            return Err(OpenApiError::Invalid("document root is not an object".to_string()));
        }
        if !raw.get("paths").map_or(false, Value::is_object) {
            return Err(OpenApiError::Invalid("missing `paths` object".to_string()));
        }

        let title = raw
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::to_string);
        let base_url = raw
            .pointer("/servers/0/url")
            .and_then(Value::as_str)
            .map(|s| s.trim_end_matches('/').to_string());

        Ok(Self {
            raw,
            title,
            base_url,
        })
    }

    /// Override the server URL requests are sent to.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Flatten every path/method pair into an [`Operation`].
    pub fn operations(&self) -> Vec<Operation> {
        let mut operations = Vec::new();
        let mut used_names = std::collections::HashSet::new();

        let Some(paths) = self.raw.get("paths").and_then(Value::as_object) else {
            return operations;
        };

        for (path, item) in paths {
            let item = self.resolve(item);
            let shared_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in METHODS {
                let Some(op) = item.get(method) else {
                    continue;
                };

                let op_params = op
                    .get("parameters")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let parameters = self.merge_parameters(&shared_params, &op_params);

                let (request_body, body_required) = match op.get("requestBody") {
                    Some(body) => {
                        let body = self.resolve(body);
                        let schema = body
                            .pointer("/content/application~1json/schema")
                            .map(|s| self.resolve_schema(s, &mut Vec::new()))
                            .unwrap_or_else(|| serde_json::json!({ "type": "object" }));
                        let required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
                        (Some(schema), required)
                    }
                    None => (None, false),
                };

                let base_name = op
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(sanitize_name)
                    .unwrap_or_else(|| sanitize_name(&format!("{}_{}", method, path)));
                let name = unique_name(base_name, &mut used_names);

                operations.push(Operation {
                    name,
                    method: method.to_uppercase(),
                    path: path.clone(),
                    summary: string_field(op, "summary"),
                    description: string_field(op, "description"),
                    parameters,
                    request_body,
                    body_required,
                });
            }
        }

        operations
    }

    /// Operation-level parameters override path-level ones with the same name and location.
    fn merge_parameters(&self, shared: &[Value], own: &[Value]) -> Vec<Parameter> {
        let mut merged: Vec<Parameter> = Vec::new();
        for raw in shared.iter().chain(own.iter()) {
            let Some(param) = self.parse_parameter(raw) else {
                continue;
            };
            if let Some(existing) = merged
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                *existing = param;
            } else {
                merged.push(param);
            }
        }
        merged
    }

    fn parse_parameter(&self, raw: &Value) -> Option<Parameter> {
        let raw = self.resolve(raw);
        let name = raw.get("name")?.as_str()?.to_string();
        let location = ParameterLocation::parse(raw.get("in")?.as_str()?)?;
        let required = location == ParameterLocation::Path
            || raw.get("required").and_then(Value::as_bool).unwrap_or(false);
        let schema = raw
            .get("schema")
            .map(|s| self.resolve_schema(s, &mut Vec::new()))
            .unwrap_or_else(|| serde_json::json!({ "type": "string" }));
        Some(Parameter {
            name,
            location,
            required,
            description: string_field(raw, "description"),
            schema,
        })
    }

    /// Follow a single local `$ref`, returning the input when it is not one.
    fn resolve<'a>(&'a self, value: &'a Value) -> &'a Value {
        value
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|r| self.lookup(r))
            .unwrap_or(value)
    }

    /// Inline schema `$ref`s, expanding each reference once per branch.
    ///
    /// `expanding` holds the references currently being inlined above this
    /// node. Meeting one of them again yields `{"type": "object"}`, carrying
    /// the target's description when it has one.
    fn resolve_schema(&self, schema: &Value, expanding: &mut Vec<String>) -> Value {
        match schema {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if let Some(target) = self.lookup(reference) {
                        if expanding.iter().any(|r| r == reference) {
                            return recursive_stub(target);
                        }
                        expanding.push(reference.to_string());
                        let resolved = self.resolve_schema(target, expanding);
                        expanding.pop();
                        return resolved;
                    }
                }
                let resolved: Map<String, Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.resolve_schema(v, expanding)))
                    .collect();
                Value::Object(resolved)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_schema(v, expanding))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn lookup(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.raw.pointer(pointer)
    }
}

fn recursive_stub(target: &Value) -> Value {
    let mut stub = Map::new();
    stub.insert("type".to_string(), Value::String("object".to_string()));
    if let Some(description) = string_field(target, "description") {
        stub.insert("description".to_string(), Value::String(description));
    }
    Value::Object(stub)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reduce a name to `[A-Za-z0-9_-]`, at most 64 characters.
pub fn sanitize_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            name.push(c);
            last_underscore = false;
        } else if !last_underscore {
            name.push('_');
            last_underscore = true;
        }
    }
    let name = name.trim_matches('_');
    let name = if name.is_empty() { "operation" } else { name };
    name.chars().take(64).collect()
}

fn unique_name(base: String, used: &mut std::collections::HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let suffix = format!("_{}", n);
        let keep = 64usize.saturating_sub(suffix.len());
        let candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SPEC: &str = r##"{
        "openapi": "3.0.1",
        "info": {"title": "WotNot API"},
        "servers": [{"url": "https://api.wotnot.io/"}],
        "components": {
            "parameters": {
                "AccountId": {"name": "account_id", "in": "path", "schema": {"type": "string"}}
            },
            "schemas": {
                "Template": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "body": {"$ref": "#/components/schemas/Body"}}
                },
                "Body": {"type": "string", "description": "Template text"},
                "Loop": {"$ref": "#/components/schemas/Loop"}
            }
        },
        "paths": {
            "/v1/accounts/{account_id}/templates": {
                "parameters": [{"$ref": "#/components/parameters/AccountId"}],
                "get": {
                    "operationId": "listTemplates",
                    "summary": "List templates",
                    "parameters": [{"name": "limit", "in": "query", "schema": {"type": "integer"}}]
                },
                "post": {
                    "operationId": "createTemplate",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Template"}}}
                    }
                }
            },
            "/v1/contacts/today": {
                "get": {"summary": "Contacts added today"},
                "delete": {"requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Loop"}}}}}
            }
        }
    }"##;

    #[test]
    fn test_parses_servers_and_title() {
        let spec = OpenApiSpec::from_text(SPEC).unwrap();
        assert_eq!(spec.title.as_deref(), Some("WotNot API"));
        assert_eq!(spec.base_url.as_deref(), Some("https://api.wotnot.io"));
        let spec = spec.with_base_url("http://localhost:9000/");
        assert_eq!(spec.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_operations_merge_path_level_parameters() {
        let ops = OpenApiSpec::from_text(SPEC).unwrap().operations();
        let list = ops.iter().find(|o| o.name == "listTemplates").unwrap();
        assert_eq!(list.method, "GET");
        assert_eq!(list.summary.as_deref(), Some("List templates"));
        assert_eq!(list.parameters.len(), 2);
        let account = list.parameters.iter().find(|p| p.name == "account_id").unwrap();
        assert_eq!(account.location, ParameterLocation::Path);
        assert!(account.required);
        let limit = list.parameters.iter().find(|p| p.name == "limit").unwrap();
        assert!(!limit.required);
    }

    #[test]
    fn test_request_body_refs_are_inlined() {
        let ops = OpenApiSpec::from_text(SPEC).unwrap().operations();
        let create = ops.iter().find(|o| o.name == "createTemplate").unwrap();
        assert!(create.body_required);
        let body = create.request_body.as_ref().unwrap();
        assert_eq!(body["properties"]["body"]["description"], "Template text");
    }

    #[test]
    fn test_cyclic_refs_terminate() {
        let ops = OpenApiSpec::from_text(SPEC).unwrap().operations();
        let delete = ops.iter().find(|o| o.method == "DELETE").unwrap();
        assert_eq!(delete.request_body.as_ref().unwrap()["type"], "object");
    }

    #[test]
    fn test_self_referencing_schema_stays_small() {
        let spec = r##"{
            "openapi": "3.0.1",
            "components": {"schemas": {
                "Node": {
                    "type": "object",
                    "description": "A linked node",
                    "properties": {
                        "label": {"type": "string"},
                        "parent": {"$ref": "#/components/schemas/Node"},
                        "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}},
                        "next": {"$ref": "#/components/schemas/Node"},
                        "prev": {"$ref": "#/components/schemas/Node"}
                    }
                }
            }},
            "paths": {"/nodes": {"post": {
                "operationId": "createNode",
                "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Node"}}}}
            }}}
        }"##;
        let ops = OpenApiSpec::from_text(spec).unwrap().operations();
        let body = ops[0].request_body.as_ref().unwrap();

        assert_eq!(body["properties"]["label"]["type"], "string");
        let parent = &body["properties"]["parent"];
        assert_eq!(parent["type"], "object");
        assert_eq!(parent["description"], "A linked node");
        assert!(parent.get("properties").is_none());
        assert!(body["properties"]["children"]["items"].get("properties").is_none());
        assert!(body.to_string().len() < 1_000);
    }

    #[test]
    fn test_sibling_refs_to_same_schema_are_both_inlined() {
        let spec = r##"{
            "openapi": "3.0.1",
            "components": {"schemas": {
                "Phone": {"type": "string", "description": "E.164 number"},
                "Contact": {"type": "object", "properties": {
                    "mobile": {"$ref": "#/components/schemas/Phone"},
                    "office": {"$ref": "#/components/schemas/Phone"}
                }}
            }},
            "paths": {"/contacts": {"post": {
                "operationId": "createContact",
                "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Contact"}}}}
            }}}
        }"##;
        let ops = OpenApiSpec::from_text(spec).unwrap().operations();
        let body = ops[0].request_body.as_ref().unwrap();
        assert_eq!(body["properties"]["mobile"]["type"], "string");
        assert_eq!(body["properties"]["office"]["type"], "string");
    }

    #[test]
    fn test_operations_without_id_get_sanitized_names() {
        let ops = OpenApiSpec::from_text(SPEC).unwrap().operations();
        assert!(ops.iter().any(|o| o.name == "get_v1_contacts_today"));
        assert!(ops.iter().any(|o| o.name == "delete_v1_contacts_today"));
    }

    #[test]
    fn test_yaml_documents_are_accepted() {
        let yaml = "openapi: 3.0.0\npaths:\n  /ping:\n    get:\n      operationId: ping\n";
        let ops = OpenApiSpec::from_text(yaml).unwrap().operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name, "ping");
    }

    #[test]
    fn test_documents_without_paths_are_rejected() {
        let err = OpenApiSpec::from_text(r#"{"openapi": "3.0.0"}"#).unwrap_err();
        assert!(matches!(err, OpenApiError::Invalid(_)));
        assert!(OpenApiSpec::from_text("- just\n- a list").is_err());
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = OpenApiSpec::from_file(Path::new("/nonexistent/wotnot_openapi.json")).unwrap_err();
        assert!(matches!(err, OpenApiError::Read { .. }));
    }

    #[test]
    fn test_from_file_reads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SPEC.as_bytes()).unwrap();
        let spec = OpenApiSpec::from_file(file.path()).unwrap();
        assert_eq!(spec.operations().len(), 4);
    }

    #[test]
    fn test_sanitize_and_unique_names() {
        assert_eq!(sanitize_name("get /v1/{id}/items"), "get_v1_id_items");
        assert_eq!(sanitize_name("///"), "operation");
        assert_eq!(sanitize_name(&"x".repeat(100)).len(), 64);

        let mut used = std::collections::HashSet::new();
        assert_eq!(unique_name("op".to_string(), &mut used), "op");
        assert_eq!(unique_name("op".to_string(), &mut used), "op_2");
    }
}
