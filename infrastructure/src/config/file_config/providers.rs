//! Provider declarations from TOML (`[[providers]]` tables)

use serde::{Deserialize, Serialize};

/// One JSON-over-HTTP provider
///
/// ```toml
/// [[providers]]
/// id = "alpha"
/// endpoint = "https://alpha.example/v1/answer"
/// api_key_env = "ALPHA_API_KEY"
/// reliability = 0.9
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProviderConfig {
    pub id: String,
    pub endpoint: String,
    /// Environment variable holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// GET endpoint used by `--health` (default: no remote check)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
    /// Trust weight in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
    /// Only called when too few primaries succeed
    #[serde(default)]
    pub fallback: bool,
}
