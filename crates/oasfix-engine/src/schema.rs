use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::de;
use crate::model::ComponentKind;

/// Primitive type tag of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl SchemaType {
    /// Parse a `type` token, tolerating case differences. Returns `None` for
    /// `null` and tokens outside the OpenAPI vocabulary.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::String | Self::Integer | Self::Number | Self::Boolean
        )
    }

    /// Whether a JSON value has the data kind this type describes.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// The empty value of this type, used to replace defaults of the wrong
    /// kind.
    pub fn empty_value(self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Integer | Self::Number => Value::Number(Number::from(0)),
            Self::Boolean => Value::Bool(false),
            Self::Object => Value::Object(serde_json::Map::new()),
            Self::Array => Value::Array(Vec::new()),
        }
    }
}

impl core::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `additionalProperties`: either a flag or an owned sub-schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Schema>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    #[serde(default, deserialize_with = "de::text")]
    pub property_name: String,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub mapping: IndexMap<String, String>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// A schema node.
///
/// Children reached through `properties`, `items`, `additionalProperties`,
/// `not` and the composition lists are owned. A node with `reference` set
/// points into the component schema table by name and is shared; it is
/// never owned by the site that refers to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(
        rename = "$ref",
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "de::opt_schema_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_type: Option<SchemaType>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::boolean",
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub nullable: bool,
    #[serde(
        default,
        deserialize_with = "de::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_length: Option<u64>,
    #[serde(
        default,
        deserialize_with = "de::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<u64>,
    #[serde(
        default,
        deserialize_with = "de::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pattern: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum: Option<Number>,
    #[serde(
        default,
        deserialize_with = "de::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum: Option<Number>,
    #[serde(
        rename = "enum",
        default,
        deserialize_with = "de::opt_values",
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(
        default,
        deserialize_with = "de::string_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de::map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub properties: IndexMap<String, Schema>,
    #[serde(
        default,
        deserialize_with = "de::opt_additional_properties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(
        default,
        deserialize_with = "de::opt_boxed_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub items: Option<Box<Schema>>,
    #[serde(
        default,
        deserialize_with = "de::opt_boxed_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub not: Option<Box<Schema>>,
    #[serde(
        default,
        deserialize_with = "de::schema_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub all_of: Vec<Schema>,
    #[serde(
        default,
        deserialize_with = "de::schema_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub one_of: Vec<Schema>,
    #[serde(
        default,
        deserialize_with = "de::schema_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub any_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    /// Keywords the engine does not interpret (`readOnly`, `deprecated`,
    /// `x-*` extensions, ...), carried through verbatim.
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Which composition list of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    AllOf,
    OneOf,
    AnyOf,
}

impl Composition {
    pub const ALL: [Composition; 3] = [Self::AllOf, Self::OneOf, Self::AnyOf];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }
}

impl Schema {
    /// A reference node pointing at `#/components/schemas/{name}`.
    pub fn reference_to(name: &str) -> Self {
        Self {
            reference: Some(ComponentKind::Schema.reference(name)),
            ..Self::default()
        }
    }

    pub fn of_type(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Name of the component schema this node points at, if it is a
    /// well-formed local schema reference.
    pub fn referenced_name(&self) -> Option<&str> {
        let reference = self.reference.as_deref()?;
        match ComponentKind::parse_reference(reference) {
            Some((ComponentKind::Schema, name)) => Some(name),
            _ => None,
        }
    }

    pub fn composition(&self, which: Composition) -> &Vec<Schema> {
        match which {
            Composition::AllOf => &self.all_of,
            Composition::OneOf => &self.one_of,
            Composition::AnyOf => &self.any_of,
        }
    }

    pub fn composition_mut(&mut self, which: Composition) -> &mut Vec<Schema> {
        match which {
            Composition::AllOf => &mut self.all_of,
            Composition::OneOf => &mut self.one_of,
            Composition::AnyOf => &mut self.any_of,
        }
    }

    pub fn has_composition(&self) -> bool {
        !self.all_of.is_empty() || !self.one_of.is_empty() || !self.any_of.is_empty()
    }

    /// A node carries no distinguishing constraint: no reference, type,
    /// properties, items, additionalProperties, enum, `not` or composition.
    ///
    /// Such nodes are pruned from composition lists.
    pub fn is_structurally_empty(&self) -> bool {
        self.reference.is_none()
            && self.schema_type.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.additional_properties.is_none()
            && self.enum_values.as_ref().is_none_or(Vec::is_empty)
            && self.not.is_none()
            && !self.has_composition()
    }

    /// A bare primitive: a primitive type and nothing structural.
    pub fn is_bare_primitive(&self) -> bool {
        self.reference.is_none()
            && self.schema_type.is_some_and(SchemaType::is_primitive)
            && self.properties.is_empty()
            && self.items.is_none()
            && self.additional_properties.is_none()
            && self.enum_values.is_none()
            && self.not.is_none()
            && !self.has_composition()
    }

    /// Whether this node carries structure of its own that a reference
    /// replacing it would lose.
    pub fn has_own_structure(&self) -> bool {
        self.schema_type.is_some_and(|t| t != SchemaType::Object)
            || !self.properties.is_empty()
            || self.items.is_some()
            || self.additional_properties.is_some()
            || self.enum_values.is_some()
            || self.not.is_some()
    }

    /// Strip everything but the `$ref` from a reference node. Returns `true`
    /// if anything was removed.
    pub fn strip_reference_siblings(&mut self) -> bool {
        let Some(reference) = self.reference.take() else {
            return false;
        };
        let had_siblings = *self != Self::default();
        *self = Self {
            reference: Some(reference),
            ..Self::default()
        };
        had_siblings
    }
}
