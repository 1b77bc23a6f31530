use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Candidate endpoints, tried in order on network failure
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_fabric")]
    pub fabric: String,
    #[serde(default)]
    pub tenant: Option<String>,

    /// Major version of the server API; 2 and below selects the legacy dialect
    #[serde(default = "default_server_major_version")]
    pub server_major_version: u32,

    /// Headers attached to every request (auth tokens and the like)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    // Transport settings
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_urls() -> Vec<String> {
    vec!["http://localhost:8529".to_string()]
}

fn default_fabric() -> String {
    "_system".to_string()
}

fn default_server_major_version() -> u32 {
    3
}

/// Version-dependent shape of request paths and bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Servers before 3.x: split `/document` and `/edge` endpoints,
    /// revisions travel as a query parameter
    Legacy,
    /// 3.x and later: unified `/document/{collection}`, revisions in `if-match`
    Current,
}

impl Dialect {
    pub fn for_major(major: u32) -> Self {
        if major <= 2 {
            Dialect::Legacy
        } else {
            Dialect::Current
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Self::default()
        }
    }

    /// Path prefix every API route hangs off
    pub fn api_root(&self) -> String {
        match &self.tenant {
            Some(tenant) => format!("/_tenant/{}/_fabric/{}/_api", tenant, self.fabric),
            None => format!("/_fabric/{}/_api", self.fabric),
        }
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::for_major(self.server_major_version)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            fabric: default_fabric(),
            tenant: None,
            server_major_version: default_server_major_version(),
            headers: HashMap::new(),
            request_timeout_ms: None,
            insecure_skip_verify: false,
        }
    }
}
