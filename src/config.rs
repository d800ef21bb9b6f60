use serde::Deserialize;

/// Engine-wide tunables.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use dashexpr::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "regex_cache_capacity": 10 }"#).unwrap();
/// assert_eq!(config.regex_cache_capacity, 10);
/// assert_eq!(config.default_max_values, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Compiled regular expressions kept by the shared cache
    pub regex_cache_capacity: usize,
    /// Parsed date patterns kept by the shared cache
    pub date_pattern_cache_capacity: usize,
    /// Resolved time zones kept by the shared cache
    pub time_zone_cache_capacity: usize,
    /// Limit used by `distinct` and `joining` when none is given
    pub default_max_values: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            regex_cache_capacity: 100,
            date_pattern_cache_capacity: 100,
            time_zone_cache_capacity: 50,
            default_max_values: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
