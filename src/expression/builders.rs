//! Construction helpers that assemble expressions from references and literals.
//!
//! The helpers render valid expression text so callers never hand-write
//! quoting or escaping. A helper-built expression evaluates exactly like the
//! equivalent hand-written string.

use serde_json::Value;

use crate::references::{PathSegment, SymbolicExpression, SymbolicReference};

/// One operand of a built expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprPart {
    /// A literal value, rendered with expression quoting
    Value(Value),
    /// A field reference, rendered as a member chain
    Reference(SymbolicReference),
    /// A nested expression, rendered in parentheses
    Expression(SymbolicExpression),
}

impl ExprPart {
    /// Expression text for this operand.
    pub fn render(&self) -> String {
        match self {
            ExprPart::Value(value) => literal(value),
            ExprPart::Reference(reference) => render_reference(reference),
            ExprPart::Expression(expression) => format!("({})", expression.expression),
        }
    }
}

impl From<&str> for ExprPart {
    fn from(value: &str) -> Self {
        ExprPart::Value(Value::String(value.to_string()))
    }
}

impl From<String> for ExprPart {
    fn from(value: String) -> Self {
        ExprPart::Value(Value::String(value))
    }
}

impl From<i64> for ExprPart {
    fn from(value: i64) -> Self {
        ExprPart::Value(Value::from(value))
    }
}

impl From<bool> for ExprPart {
    fn from(value: bool) -> Self {
        ExprPart::Value(Value::Bool(value))
    }
}

impl From<Value> for ExprPart {
    fn from(value: Value) -> Self {
        ExprPart::Value(value)
    }
}

impl From<SymbolicReference> for ExprPart {
    fn from(reference: SymbolicReference) -> Self {
        ExprPart::Reference(reference)
    }
}

impl From<&SymbolicReference> for ExprPart {
    fn from(reference: &SymbolicReference) -> Self {
        ExprPart::Reference(reference.clone())
    }
}

impl From<SymbolicExpression> for ExprPart {
    fn from(expression: SymbolicExpression) -> Self {
        ExprPart::Expression(expression)
    }
}

/// Quote a string as a double-quoted expression literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.is_f64() => {
            let text = n.to_string();
            if text.contains(['.', 'e', 'E']) {
                text
            } else {
                format!("{text}.0")
            }
        }
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            format!("[{}]", items.iter().map(literal).collect::<Vec<_>>().join(", "))
        }
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", quote(k), literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !matches!(key, "true" | "false" | "null" | "in")
}

/// Render a reference as a member chain, indexing keys that are not identifiers.
///
/// A resource id that is not an identifier (`web-db`) is written backtick-quoted.
pub fn render_reference(reference: &SymbolicReference) -> String {
    let root = render_variable(reference.variable_name());
    let Ok(path) = reference.parsed_path() else {
        return match reference.field_path.as_str() {
            "" => root,
            field if field.starts_with('[') => format!("{root}{field}"),
            field => format!("{root}.{field}"),
        };
    };
    let mut out = root;
    for segment in path.segments() {
        match segment {
            PathSegment::Key(key) if is_identifier(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Key(key) => {
                out.push('[');
                out.push_str(&quote(key));
                out.push(']');
            }
            PathSegment::Index(index) => {
                out.push_str(&format!("[{index}]"));
            }
        }
    }
    out
}

fn render_variable(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

fn join<I, P>(parts: I, separator: &str) -> String
where
    I: IntoIterator<Item = P>,
    P: Into<ExprPart>,
{
    parts.into_iter().map(|p| p.into().render()).collect::<Vec<_>>().join(separator)
}

/// Builders for common expression shapes.
///
/// # Examples
///
/// ```rust
/// use refgraph_cli::expression::{CelBuilders, ExprPart};
/// use refgraph_cli::references::SymbolicReference;
///
/// let ip = SymbolicReference::new("svc", "status.clusterIP");
/// let url = CelBuilders::concat([ExprPart::from("http://"), ExprPart::from(&ip)]);
/// assert_eq!(url.expression, r#"concat("http://", svc.status.clusterIP)"#);
/// ```
pub struct CelBuilders;

impl CelBuilders {
    /// `concat(a, b, ...)`
    pub fn concat<I, P>(parts: I) -> SymbolicExpression
    where
        I: IntoIterator<Item = P>,
        P: Into<ExprPart>,
    {
        SymbolicExpression::new(format!("concat({})", join(parts, ", ")))
    }

    /// String interpolation: literal parts are joined with `string()`-converted operands.
    pub fn template<I, P>(parts: I) -> SymbolicExpression
    where
        I: IntoIterator<Item = P>,
        P: Into<ExprPart>,
    {
        let rendered: Vec<String> = parts
            .into_iter()
            .map(|part| match part.into() {
                ExprPart::Value(Value::String(s)) => quote(&s),
                other => format!("string({})", other.render()),
            })
            .collect();
        if rendered.is_empty() {
            SymbolicExpression::new("\"\"")
        } else {
            SymbolicExpression::new(rendered.join(" + "))
        }
    }

    /// `condition ? then : otherwise`
    pub fn conditional(
        condition: impl Into<ExprPart>,
        then: impl Into<ExprPart>,
        otherwise: impl Into<ExprPart>,
    ) -> SymbolicExpression {
        SymbolicExpression::new(format!(
            "{} ? {} : {}",
            condition.into().render(),
            then.into().render(),
            otherwise.into().render()
        ))
    }

    /// `has(resource.field)`
    pub fn has(reference: &SymbolicReference) -> SymbolicExpression {
        SymbolicExpression::new(format!("has({})", render_reference(reference)))
    }

    /// `size(x)`
    pub fn size(target: impl Into<ExprPart>) -> SymbolicExpression {
        SymbolicExpression::new(format!("size({})", target.into().render()))
    }

    /// `x.startsWith("prefix")`
    pub fn starts_with(target: impl Into<ExprPart>, prefix: &str) -> SymbolicExpression {
        Self::receiver(target, "startsWith", prefix)
    }

    /// `x.endsWith("suffix")`
    pub fn ends_with(target: impl Into<ExprPart>, suffix: &str) -> SymbolicExpression {
        Self::receiver(target, "endsWith", suffix)
    }

    /// `x.contains("needle")`
    pub fn contains(target: impl Into<ExprPart>, needle: &str) -> SymbolicExpression {
        Self::receiver(target, "contains", needle)
    }

    /// `list.map(var, body)`
    pub fn map(collection: impl Into<ExprPart>, variable: &str, body: &str) -> SymbolicExpression {
        Self::collection_macro(collection, "map", variable, body)
    }

    /// `list.filter(var, predicate)`
    pub fn filter(
        collection: impl Into<ExprPart>,
        variable: &str,
        predicate: &str,
    ) -> SymbolicExpression {
        Self::collection_macro(collection, "filter", variable, predicate)
    }

    /// `list.all(var, predicate)`
    pub fn all(collection: impl Into<ExprPart>, variable: &str, predicate: &str) -> SymbolicExpression {
        Self::collection_macro(collection, "all", variable, predicate)
    }

    /// `list.exists(var, predicate)`
    pub fn exists(
        collection: impl Into<ExprPart>,
        variable: &str,
        predicate: &str,
    ) -> SymbolicExpression {
        Self::collection_macro(collection, "exists", variable, predicate)
    }

    /// `left == right`
    pub fn equals(left: impl Into<ExprPart>, right: impl Into<ExprPart>) -> SymbolicExpression {
        SymbolicExpression::new(format!("{} == {}", left.into().render(), right.into().render()))
    }

    /// Wrap hand-written expression text.
    pub fn raw(expression: impl Into<String>) -> SymbolicExpression {
        SymbolicExpression::new(expression)
    }

    fn receiver(target: impl Into<ExprPart>, method: &str, argument: &str) -> SymbolicExpression {
        SymbolicExpression::new(format!("{}.{method}({})", target.into().render(), quote(argument)))
    }

    fn collection_macro(
        collection: impl Into<ExprPart>,
        method: &str,
        variable: &str,
        body: &str,
    ) -> SymbolicExpression {
        SymbolicExpression::new(format!("{}.{method}({variable}, {body})", collection.into().render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn test_render_reference_indexes_odd_keys() {
        let reference = SymbolicReference::new("app", "metadata.labels.app-name");
        assert_eq!(render_reference(&reference), "app.metadata.labels[\"app-name\"]");
        let hyphenated = SymbolicReference::new("web-db", "status.ready");
        assert_eq!(render_reference(&hyphenated), "`web-db`.status.ready");
        let schema = SymbolicReference::schema("spec.items[2].name");
        assert_eq!(render_reference(&schema), "schema.spec.items[2].name");
    }

    #[test]
    fn test_builders_render() {
        let ip = SymbolicReference::new("svc", "status.clusterIP");
        assert_eq!(
            CelBuilders::concat([ExprPart::from("http://"), ExprPart::from(&ip)]).expression,
            "concat(\"http://\", svc.status.clusterIP)"
        );
        assert_eq!(
            CelBuilders::template([ExprPart::from("http://"), ExprPart::from(&ip), ExprPart::from(":80")])
                .expression,
            "\"http://\" + string(svc.status.clusterIP) + \":80\""
        );
        assert_eq!(
            CelBuilders::conditional(CelBuilders::has(&ip), "yes", 0_i64).expression,
            "(has(svc.status.clusterIP)) ? \"yes\" : 0"
        );
        assert_eq!(
            CelBuilders::filter(SymbolicReference::new("app", "spec.ports"), "p", "p > 1024").expression,
            "app.spec.ports.filter(p, p > 1024)"
        );
        assert_eq!(CelBuilders::equals(&ip, Value::Null).expression, "svc.status.clusterIP == null");
    }
}
