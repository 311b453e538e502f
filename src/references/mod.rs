//! Reference and expression model for resource configurations.
//!
//! Resource configurations are authored as nested value trees in which any node
//! may be a *symbolic reference* ("the value of field X on resource Y") or a
//! *symbolic expression* (a small CEL-like formula over resources). This module
//! defines those value types, the closed [`ConfigValue`] union that carries them,
//! field path handling, and the extraction walk every other component relies on.
//!
//! # Encoding
//!
//! In YAML or JSON a reference is written as a single-key map:
//!
//! ```yaml
//! env:
//!   - name: DB_HOST
//!     value: { $ref: database.status.podIP }
//!   - name: GREETING
//!     value: { $expr: 'concat("hello ", schema.spec.name)' }
//! ```
//!
//! The long form `{ $ref: { resourceId: database, fieldPath: status.podIP, type: string } }`
//! carries a declared type. `schema.` addresses the input schema and is stored
//! under the reserved [`SCHEMA_RESOURCE_ID`].

pub mod extract;
pub mod path;

pub use extract::{FoundReference, TraversalError, contains_symbols, extract_references};
pub use path::{FieldPath, FieldPathError, PathSegment};

use indexmap::IndexMap;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use crate::constants::SCHEMA_RESOURCE_ID;
use crate::constants::SCHEMA_VARIABLE;

/// Map key marking a symbolic reference node.
pub const REF_KEY: &str = "$ref";
/// Map key marking a symbolic expression node.
pub const EXPR_KEY: &str = "$expr";
/// Accepted alias for [`EXPR_KEY`].
pub const CEL_KEY: &str = "$cel";

/// Declared or inferred type of a referenced field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Unknown,
}

impl TypeTag {
    /// Infer the tag of a concrete JSON value. `null` is `unknown`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Unknown,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) if n.is_f64() => TypeTag::Number,
            Value::Number(_) => TypeTag::Integer,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }

    /// Lowercase name as used in manifests and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(TypeTag::String),
            "integer" | "int" => Ok(TypeTag::Integer),
            "number" | "double" | "float" => Ok(TypeTag::Number),
            "boolean" | "bool" => Ok(TypeTag::Boolean),
            "object" | "map" => Ok(TypeTag::Object),
            "array" | "list" => Ok(TypeTag::Array),
            "unknown" | "any" => Ok(TypeTag::Unknown),
            other => Err(format!("unknown type '{other}'")),
        }
    }
}

/// A placeholder for "the value of `field_path` on resource `resource_id`".
///
/// Identity is structural over `resource_id` and `field_path`; the declared type
/// is metadata and does not participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolicReference {
    /// Logical id of the referenced resource, or [`SCHEMA_RESOURCE_ID`]
    pub resource_id: String,
    /// Dot path with optional `[n]` segments into the referenced manifest
    pub field_path: String,
    /// Declared type of the referenced field, if the author stated one
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<TypeTag>,
}

impl SymbolicReference {
    /// Create a reference to a field of a resource.
    pub fn new(resource_id: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            field_path: field_path.into(),
            declared_type: None,
        }
    }

    /// Create a reference into the input schema.
    pub fn schema(field_path: impl Into<String>) -> Self {
        Self::new(SCHEMA_RESOURCE_ID, field_path)
    }

    /// Attach a declared type.
    #[must_use]
    pub fn with_type(mut self, declared_type: TypeTag) -> Self {
        self.declared_type = Some(declared_type);
        self
    }

    /// Parse the short textual form `resourceId.field.path`.
    ///
    /// The first segment is the resource id; `schema` maps to the schema sentinel.
    ///
    /// ```rust
    /// use refgraph_cli::references::SymbolicReference;
    ///
    /// let r = SymbolicReference::parse("svc.status.loadBalancer.ingress[0].ip").unwrap();
    /// assert_eq!(r.resource_id, "svc");
    /// assert_eq!(r.field_path, "status.loadBalancer.ingress[0].ip");
    /// assert!(SymbolicReference::parse("schema.spec.name").unwrap().is_schema());
    /// ```
    pub fn parse(text: &str) -> Result<Self, FieldPathError> {
        let text = text.trim();
        let split = text.find(['.', '[']).unwrap_or(text.len());
        let (id, rest) = text.split_at(split);
        if id.is_empty() {
            return Err(FieldPathError {
                path: text.to_string(),
                reason: "reference is missing a resource id".to_string(),
            });
        }
        let field_path = rest.strip_prefix('.').unwrap_or(rest);
        FieldPath::parse(field_path)?;
        let resource_id = if id == SCHEMA_VARIABLE {
            SCHEMA_RESOURCE_ID
        } else {
            id
        };
        Ok(Self::new(resource_id, field_path))
    }

    /// Whether this reference addresses the input schema.
    pub fn is_schema(&self) -> bool {
        self.resource_id == SCHEMA_RESOURCE_ID
    }

    /// Variable name under which the referenced resource is visible to expressions.
    pub fn variable_name(&self) -> &str {
        if self.is_schema() {
            SCHEMA_VARIABLE
        } else {
            &self.resource_id
        }
    }

    /// Resolution cache key: `<resourceId>.<fieldPath>`.
    pub fn cache_key(&self) -> String {
        format!("{}.{}", self.resource_id, self.field_path)
    }

    /// Parse the field path.
    pub fn parsed_path(&self) -> Result<FieldPath, FieldPathError> {
        FieldPath::parse(&self.field_path)
    }
}

impl PartialEq for SymbolicReference {
    fn eq(&self, other: &Self) -> bool {
        self.resource_id == other.resource_id && self.field_path == other.field_path
    }
}

impl Eq for SymbolicReference {}

impl Hash for SymbolicReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource_id.hash(state);
        self.field_path.hash(state);
    }
}

impl fmt::Display for SymbolicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_path.is_empty() {
            write!(f, "{}", self.variable_name())
        } else if self.field_path.starts_with('[') {
            write!(f, "{}{}", self.variable_name(), self.field_path)
        } else {
            write!(f, "{}.{}", self.variable_name(), self.field_path)
        }
    }
}

/// A textual CEL-like expression whose free variables are resource ids or `schema`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolicExpression {
    /// Expression source text
    pub expression: String,
}

impl SymbolicExpression {
    /// Wrap expression text.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    /// Resolution cache key: `cel:<expression>`.
    pub fn cache_key(&self) -> String {
        format!("{}{}", crate::constants::EXPRESSION_CACHE_PREFIX, self.expression)
    }

    /// References lexically embedded in the expression.
    ///
    /// Returns an empty list when the expression does not parse; resolution will
    /// report the parse failure with full context.
    pub fn references(&self) -> Vec<SymbolicReference> {
        match crate::expression::parse(&self.expression) {
            Ok(compiled) => compiled.references(),
            Err(e) => {
                tracing::warn!(
                    "Skipping reference extraction for unparseable expression '{}': {}",
                    self.expression,
                    e
                );
                Vec::new()
            }
        }
    }
}

impl fmt::Display for SymbolicExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// A node of an authored resource configuration.
///
/// This is a closed union: every traversal in the crate matches on these variants
/// exhaustively, so adding a variant is a compile-time checked change.
/// [`ConfigValue::Shared`] lets one subtree instance appear in several places;
/// traversals track visited shared nodes by identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Map(IndexMap<String, ConfigValue>),
    Reference(SymbolicReference),
    Expression(SymbolicExpression),
    Shared(Arc<ConfigValue>),
}

impl ConfigValue {
    /// Convenience constructor for a reference node.
    pub fn reference(resource_id: impl Into<String>, field_path: impl Into<String>) -> Self {
        ConfigValue::Reference(SymbolicReference::new(resource_id, field_path))
    }

    /// Convenience constructor for an expression node.
    pub fn expression(expression: impl Into<String>) -> Self {
        ConfigValue::Expression(SymbolicExpression::new(expression))
    }

    /// Wrap a subtree so it can be placed at several locations.
    pub fn shared(value: ConfigValue) -> Self {
        ConfigValue::Shared(Arc::new(value))
    }

    /// Whether any reference or expression exists anywhere below this node.
    pub fn contains_symbols(&self) -> bool {
        contains_symbols(self)
    }

    /// Convert plain data into a configuration value. No `$ref` interpretation
    /// happens here: resolved values are data, never symbols.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Array(items) => ConfigValue::Sequence(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => ConfigValue::Map(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect(),
            ),
        }
    }

    /// Convert into JSON using the `$ref` / `$expr` encoding for symbolic nodes.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Int(i) => Value::from(*i),
            ConfigValue::Float(f) => {
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Map(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            ConfigValue::Reference(reference) => Value::Object(serde_json::Map::from_iter([(
                REF_KEY.to_string(),
                Value::String(reference.to_string()),
            )])),
            ConfigValue::Expression(expression) => {
                Value::Object(serde_json::Map::from_iter([(
                    EXPR_KEY.to_string(),
                    Value::String(expression.expression.clone()),
                )]))
            }
            ConfigValue::Shared(inner) => inner.to_json(),
        }
    }

    /// Look up a key on a map node, looking through shared wrappers.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Map(map) => map.get(key),
            ConfigValue::Shared(inner) => inner.get(key),
            _ => None,
        }
    }

    /// String content of a string node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            ConfigValue::Shared(inner) => inner.as_str(),
            _ => None,
        }
    }

    /// Interpret a single-key `$ref` / `$expr` map as a symbolic node.
    fn from_marker_map(map: IndexMap<String, ConfigValue>) -> Result<Self, String> {
        if map.len() != 1 {
            return Ok(ConfigValue::Map(map));
        }
        let Some((key, value)) = map.first() else {
            return Ok(ConfigValue::Map(map));
        };
        match key.as_str() {
            REF_KEY => match value {
                ConfigValue::String(text) => SymbolicReference::parse(text)
                    .map(ConfigValue::Reference)
                    .map_err(|e| e.to_string()),
                ConfigValue::Map(fields) => {
                    let resource_id = fields
                        .get("resourceId")
                        .and_then(ConfigValue::as_str)
                        .ok_or("$ref map requires a string 'resourceId'")?;
                    let field_path = fields
                        .get("fieldPath")
                        .and_then(ConfigValue::as_str)
                        .ok_or("$ref map requires a string 'fieldPath'")?;
                    FieldPath::parse(field_path).map_err(|e| e.to_string())?;
                    let mut reference = SymbolicReference::new(resource_id, field_path);
                    if let Some(declared) = fields.get("type").and_then(ConfigValue::as_str) {
                        reference.declared_type = Some(declared.parse()?);
                    }
                    Ok(ConfigValue::Reference(reference))
                }
                _ => Err("$ref must be a string or a map".to_string()),
            },
            EXPR_KEY | CEL_KEY => match value {
                ConfigValue::String(text) => Ok(ConfigValue::expression(text.clone())),
                _ => Err(format!("{key} must be a string")),
            },
            _ => Ok(ConfigValue::Map(map)),
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        ConfigValue::from_json(&value)
    }
}

impl From<SymbolicReference> for ConfigValue {
    fn from(reference: SymbolicReference) -> Self {
        ConfigValue::Reference(reference)
    }
}

impl From<SymbolicExpression> for ConfigValue {
    fn from(expression: SymbolicExpression) -> Self {
        ConfigValue::Expression(expression)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Null => serializer.serialize_unit(),
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Int(i) => serializer.serialize_i64(*i),
            ConfigValue::Float(f) => serializer.serialize_f64(*f),
            ConfigValue::String(s) => serializer.serialize_str(s),
            ConfigValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ConfigValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            ConfigValue::Reference(reference) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(REF_KEY, &reference.to_string())?;
                out.end()
            }
            ConfigValue::Expression(expression) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(EXPR_KEY, &expression.expression)?;
                out.end()
            }
            ConfigValue::Shared(inner) => inner.serialize(serializer),
        }
    }
}

struct ConfigValueVisitor;

impl<'de> Visitor<'de> for ConfigValueVisitor {
    type Value = ConfigValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ConfigValue, D::Error> {
        ConfigValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigValue, E> {
        Ok(i64::try_from(v).map(ConfigValue::Int).unwrap_or(ConfigValue::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigValue, E> {
        Ok(ConfigValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ConfigValue, E> {
        Ok(ConfigValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ConfigValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ConfigValue>()? {
            items.push(item);
        }
        Ok(ConfigValue::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigValue, A::Error> {
        let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, ConfigValue>()? {
            map.insert(key, value);
        }
        ConfigValue::from_marker_map(map).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConfigValueVisitor)
    }
}
