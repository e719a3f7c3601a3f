//! Rate key generation and handling.

/// A key that uniquely identifies one limited unit of request traffic.
///
/// The key is composed of the HTTP method, the route path template, and the
/// resolved identifying properties in configured order. Requests that should
/// share a limit map to equal keys; requests that differ in any component
/// are limited independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    /// HTTP method of the request
    pub method: String,
    /// Route path template the request matched
    pub route: String,
    /// Resolved `property=value` pairs, in configured order
    pub properties: Vec<(String, String)>,
}

impl RateKey {
    /// Create a new rate key.
    pub fn new(
        method: impl Into<String>,
        route: impl Into<String>,
        properties: Vec<(String, String)>,
    ) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            properties,
        }
    }

    /// Convert the key to a string representation.
    ///
    /// This is useful for logging and debugging.
    pub fn to_string_key(&self) -> String {
        let properties_str: Vec<String> = self
            .properties
            .iter()
            .map(|(property, value)| format!("{}={}", property, value))
            .collect();

        format!(
            "{} {} [{}]",
            self.method,
            self.route,
            properties_str.join("+")
        )
    }
}

impl std::fmt::Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
