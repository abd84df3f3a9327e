//! The typed document graph.
//!
//! Only the members the engine reasons about are modelled; everything else
//! (`info`, `servers`, `tags`, `x-*` extensions, ...) lands in a flattened
//! `extensions` map on the nearest enclosing node and is written back
//! unchanged.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::de;
use crate::schema::Schema;

/// One security requirement: scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Value>,
    #[serde(default, deserialize_with = "de::map")]
    pub paths: IndexMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "Components::is_empty")]
    pub components: Components,
    #[serde(
        default,
        deserialize_with = "de::opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub schemas: IndexMap<String, Schema>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub parameters: IndexMap<String, RefOr<Parameter>>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub request_bodies: IndexMap<String, RefOr<RequestBody>>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub responses: IndexMap<String, RefOr<Response>>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub headers: IndexMap<String, RefOr<Header>>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub security_schemes: IndexMap<String, RefOr<Value>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.parameters.is_empty()
            && self.request_bodies.is_empty()
            && self.responses.is_empty()
            && self.headers.is_empty()
            && self.security_schemes.is_empty()
            && self.extensions.is_empty()
    }

    /// Whether a component of the given kind exists under `name`.
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        match kind {
            ComponentKind::Schema => self.schemas.contains_key(name),
            ComponentKind::Parameter => self.parameters.contains_key(name),
            ComponentKind::RequestBody => self.request_bodies.contains_key(name),
            ComponentKind::Response => self.responses.contains_key(name),
            ComponentKind::Header => self.headers.contains_key(name),
            ComponentKind::SecurityScheme => self.security_schemes.contains_key(name),
        }
    }

    /// Names of every component of one kind, in document order.
    pub fn names(&self, kind: ComponentKind) -> Vec<String> {
        match kind {
            ComponentKind::Schema => self.schemas.keys().cloned().collect(),
            ComponentKind::Parameter => self.parameters.keys().cloned().collect(),
            ComponentKind::RequestBody => self.request_bodies.keys().cloned().collect(),
            ComponentKind::Response => self.responses.keys().cloned().collect(),
            ComponentKind::Header => self.headers.keys().cloned().collect(),
            ComponentKind::SecurityScheme => self.security_schemes.keys().cloned().collect(),
        }
    }

    /// Rename a component in place, keeping its position. Returns `false` if
    /// `from` does not exist or `to` is already taken.
    pub fn rename(&mut self, kind: ComponentKind, from: &str, to: &str) -> bool {
        fn rename_in<T>(map: &mut IndexMap<String, T>, from: &str, to: &str) -> bool {
            if map.contains_key(to) {
                return false;
            }
            let Some(index) = map.get_index_of(from) else {
                return false;
            };
            let Some(value) = map.shift_remove(from) else {
                return false;
            };
            map.shift_insert(index, to.to_string(), value);
            true
        }
        match kind {
            ComponentKind::Schema => rename_in(&mut self.schemas, from, to),
            ComponentKind::Parameter => rename_in(&mut self.parameters, from, to),
            ComponentKind::RequestBody => rename_in(&mut self.request_bodies, from, to),
            ComponentKind::Response => rename_in(&mut self.responses, from, to),
            ComponentKind::Header => rename_in(&mut self.headers, from, to),
            ComponentKind::SecurityScheme => rename_in(&mut self.security_schemes, from, to),
        }
    }

    /// Resolve a parameter through `#/components/parameters/...` references.
    pub fn resolve_parameter<'a>(
        &'a self,
        parameter: &'a RefOr<Parameter>,
    ) -> Option<&'a Parameter> {
        resolve_in(&self.parameters, ComponentKind::Parameter, parameter)
    }
}

/// Follow `item` through references into `table`, the component table of
/// `kind`. Returns `None` for dangling references, references of another
/// kind and reference cycles.
pub fn resolve_in<'a, T>(
    table: &'a IndexMap<String, RefOr<T>>,
    kind: ComponentKind,
    item: &'a RefOr<T>,
) -> Option<&'a T> {
    let mut current = item;
    // Bounded by the table size: a longer chain must contain a cycle.
    for _ in 0..=table.len() {
        match current {
            RefOr::Item(found) => return Some(found),
            RefOr::Ref(r) => {
                let (found, name) = ComponentKind::parse_reference(&r.reference)?;
                if found != kind {
                    return None;
                }
                current = table.get(name)?;
            }
        }
    }
    None
}

/// The kinds of reusable component, each with its own name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Schema,
    Parameter,
    RequestBody,
    Response,
    Header,
    SecurityScheme,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        Self::Schema,
        Self::Parameter,
        Self::RequestBody,
        Self::Response,
        Self::Header,
        Self::SecurityScheme,
    ];

    /// Key of this kind's table under `components`.
    pub fn section(self) -> &'static str {
        match self {
            Self::Schema => "schemas",
            Self::Parameter => "parameters",
            Self::RequestBody => "requestBodies",
            Self::Response => "responses",
            Self::Header => "headers",
            Self::SecurityScheme => "securitySchemes",
        }
    }

    fn from_section(section: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.section() == section)
    }

    /// Canonical local reference to a component of this kind.
    pub fn reference(self, name: &str) -> String {
        format!("#/components/{}/{}", self.section(), escape_pointer(name))
    }

    /// Split a local component reference into its kind and (unescaped)
    /// name. Returns `None` for external, malformed or nested references.
    pub fn parse_reference(reference: &str) -> Option<(Self, &str)> {
        let rest = reference.strip_prefix("#/components/")?;
        let (section, name) = rest.split_once('/')?;
        if name.is_empty() || name.contains('/') || name.contains('~') {
            return None;
        }
        Some((Self::from_section(section)?, name))
    }
}

impl core::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.section())
    }
}

/// Escape a single JSON pointer segment (RFC 6901).
pub fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A `$ref` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub reference: String,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Either an inline object or a reference to a component of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Ref(Reference),
    Item(T),
}

impl<T> RefOr<T> {
    pub fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Ref(_) => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Ref(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Ref(r) => Some(&r.reference),
            Self::Item(_) => None,
        }
    }

    pub fn reference_to(kind: ComponentKind, name: &str) -> Self {
        Self::Ref(Reference {
            reference: kind.reference(name),
            extensions: IndexMap::new(),
        })
    }
}

// Untagged enums report "data did not match any variant" for any failure in
// `T`; deciding on `$ref` first keeps the inner error message intact.
impl<'de, T: DeserializeOwned> Deserialize<'de> for RefOr<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        let is_ref = value.get("$ref").is_some_and(Value::is_string);
        if is_ref {
            serde_json::from_value(value)
                .map(RefOr::Ref)
                .map_err(serde::de::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(RefOr::Item)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// HTTP methods an OpenAPI path item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }

    /// Status code conventionally returned on success.
    pub fn success_status(self) -> &'static str {
        match self {
            Self::Post => "201",
            Self::Delete => "204",
            _ => "200",
        }
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
    #[serde(
        default,
        deserialize_with = "de::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<RefOr<Parameter>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl PathItem {
    pub fn operation(&self, method: Method) -> Option<&Operation> {
        match method {
            Method::Get => self.get.as_ref(),
            Method::Put => self.put.as_ref(),
            Method::Post => self.post.as_ref(),
            Method::Delete => self.delete.as_ref(),
            Method::Options => self.options.as_ref(),
            Method::Head => self.head.as_ref(),
            Method::Patch => self.patch.as_ref(),
            Method::Trace => self.trace.as_ref(),
        }
    }

    pub fn operation_slot(&mut self, method: Method) -> &mut Option<Operation> {
        match method {
            Method::Get => &mut self.get,
            Method::Put => &mut self.put,
            Method::Post => &mut self.post,
            Method::Delete => &mut self.delete,
            Method::Options => &mut self.options,
            Method::Head => &mut self.head,
            Method::Patch => &mut self.patch,
            Method::Trace => &mut self.trace,
        }
    }

    /// Operations in canonical method order.
    pub fn operations(&self) -> impl Iterator<Item = (Method, &Operation)> {
        Method::ALL
            .into_iter()
            .filter_map(|m| self.operation(m).map(|op| (m, op)))
    }

    /// Mutable operations in canonical method order.
    pub fn operations_mut(&mut self) -> impl Iterator<Item = (Method, &mut Operation)> {
        [
            (Method::Get, &mut self.get),
            (Method::Put, &mut self.put),
            (Method::Post, &mut self.post),
            (Method::Delete, &mut self.delete),
            (Method::Options, &mut self.options),
            (Method::Head, &mut self.head),
            (Method::Patch, &mut self.patch),
            (Method::Trace, &mut self.trace),
        ]
        .into_iter()
        .filter_map(|(m, slot)| slot.as_mut().map(|op| (m, op)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<RefOr<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RefOr<RequestBody>>,
    #[serde(default, deserialize_with = "de::map")]
    pub responses: IndexMap<String, RefOr<Response>>,
    #[serde(
        default,
        deserialize_with = "de::opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "path" => Some(Self::Path),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

fn opt_location<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ParameterLocation>, D::Error> {
    Ok(de::opt_string(d)?.and_then(|s| ParameterLocation::from_token(&s)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(
        rename = "in",
        default,
        deserialize_with = "opt_location",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<ParameterLocation>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::boolean",
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "de::opt_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<Schema>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub content: IndexMap<String, MediaType>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl Parameter {
    /// A required path parameter accepting any string.
    pub fn path(name: &str) -> Self {
        Self {
            name: name.to_string(),
            location: Some(ParameterLocation::Path),
            required: true,
            schema: Some(Schema::of_type(crate::schema::SchemaType::String)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::boolean",
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "de::opt_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<Schema>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub content: IndexMap<String, MediaType>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::map")]
    pub content: IndexMap<String, MediaType>,
    #[serde(
        default,
        deserialize_with = "de::boolean",
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub required: bool,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, deserialize_with = "de::text")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub headers: IndexMap<String, RefOr<Header>>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub content: IndexMap<String, MediaType>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(
        default,
        deserialize_with = "de::opt_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// `application/json`, the media type fallbacks are declared with.
pub const JSON_MEDIA_TYPE: &str = "application/json";

impl RequestBody {
    /// A JSON body accepting any object.
    pub fn generic() -> Self {
        let mut content = IndexMap::new();
        content.insert(JSON_MEDIA_TYPE.to_string(), MediaType::generic_object());
        Self {
            content,
            ..Self::default()
        }
    }
}

impl Response {
    /// A response with a generic JSON object body, or no body for `204`.
    pub fn generic(status: &str) -> Self {
        let mut content = IndexMap::new();
        if status != "204" {
            content.insert(JSON_MEDIA_TYPE.to_string(), MediaType::generic_object());
        }
        Self {
            description: if status == "204" {
                "No Content".to_string()
            } else {
                "Success".to_string()
            },
            content,
            ..Self::default()
        }
    }
}

impl MediaType {
    pub fn generic_object() -> Self {
        Self {
            schema: Some(Schema::of_type(crate::schema::SchemaType::Object)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_reference_kinds() {
        assert_eq!(
            ComponentKind::parse_reference("#/components/schemas/Pet"),
            Some((ComponentKind::Schema, "Pet"))
        );
        assert_eq!(
            ComponentKind::parse_reference("#/components/requestBodies/NewPet"),
            Some((ComponentKind::RequestBody, "NewPet"))
        );
        assert_eq!(ComponentKind::parse_reference("#/definitions/Pet"), None);
        assert_eq!(ComponentKind::parse_reference("#/components/schemas/"), None);
        assert_eq!(ComponentKind::parse_reference("#/components/widgets/A"), None);
    }

    #[test]
    fn ref_or_prefers_reference() {
        let p: RefOr<Parameter> =
            serde_json::from_value(json!({"$ref": "#/components/parameters/Limit"}))
                .expect("reference deserializes");
        assert_eq!(p.as_reference(), Some("#/components/parameters/Limit"));

        let p: RefOr<Parameter> = serde_json::from_value(json!({"name": "id", "in": "PATH"}))
            .expect("parameter deserializes");
        let item = p.as_item().expect("inline parameter");
        assert_eq!(item.location, Some(ParameterLocation::Path));
    }

    #[test]
    fn operations_iterate_in_method_order() {
        let item: PathItem = serde_json::from_value(json!({
            "post": {"operationId": "create"},
            "get": {"operationId": "list"}
        }))
        .expect("path item deserializes");
        let ids: Vec<_> = item
            .operations()
            .map(|(m, op)| (m, op.operation_id.as_deref()))
            .collect();
        assert_eq!(
            ids,
            [(Method::Get, Some("list")), (Method::Post, Some("create"))]
        );
    }

    #[test]
    fn rename_keeps_position() {
        let mut components: Components = serde_json::from_value(json!({
            "schemas": {"A": {}, "B.C": {}, "D": {}}
        }))
        .expect("components deserialize");
        assert!(components.rename(ComponentKind::Schema, "B.C", "B_C"));
        assert_eq!(components.names(ComponentKind::Schema), ["A", "B_C", "D"]);
        assert!(!components.rename(ComponentKind::Schema, "A", "D"));
    }

    #[test]
    fn parameter_reference_chains_resolve() {
        let components: Components = serde_json::from_value(json!({
            "parameters": {
                "Alias": {"$ref": "#/components/parameters/Id"},
                "Id": {"name": "id", "in": "path", "required": true},
                "Loop": {"$ref": "#/components/parameters/Loop"}
            }
        }))
        .expect("components deserialize");
        let alias = RefOr::<Parameter>::reference_to(ComponentKind::Parameter, "Alias");
        assert_eq!(
            components.resolve_parameter(&alias).map(|p| p.name.as_str()),
            Some("id")
        );
        let looping = RefOr::<Parameter>::reference_to(ComponentKind::Parameter, "Loop");
        assert!(components.resolve_parameter(&looping).is_none());
    }
}
