//! Request snapshots and dot-path property resolution.

use serde_json::Value;

/// An immutable view of one incoming request, sufficient for an admission
/// decision: the HTTP method, the route path template, and the nested data
/// (headers, query, params, body) that identifying properties are resolved
/// against.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: String,
    route: String,
    data: Value,
}

impl RequestSnapshot {
    /// Create a new snapshot.
    pub fn new(method: impl Into<String>, route: impl Into<String>, data: Value) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            data,
        }
    }

    /// The HTTP method of the request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The route path template the request matched.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Resolve a dot-notation path against the snapshot data.
    ///
    /// Returns `None` when any intermediate segment is missing, or when the
    /// leaf is null, an empty string, or a non-scalar value. Numeric
    /// segments index into arrays. Never panics.
    pub fn value_at(&self, path: &str) -> Option<String> {
        let mut current = &self.data;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        scalar_to_string(current)
    }
}

/// Render a scalar leaf as the string that participates in the rate key.
///
/// Numbers and booleans (including `false` and `0`) stringify; null, empty
/// strings, objects, and arrays count as absent.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
