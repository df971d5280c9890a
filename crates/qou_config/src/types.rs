//! Configuration types deserialized from `qou.toml`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// The top-level project configuration parsed from `qou.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Connection settings for the search index.
    #[serde(default)]
    pub index: IndexConfig,
    /// Bounded connection pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Retry policy for transient index failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-request settings.
    #[serde(default)]
    pub request: RequestConfig,
    /// External artifact generation step.
    pub generate: GenerateConfig,
    /// Where the generated artifact is packaged.
    #[serde(default)]
    pub package: PackageConfig,
    /// Catalog seeding sources.
    #[serde(default)]
    pub seed: SeedConfig,
    /// Directory holding the generation manifest, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".qou-cache")
}

/// Core project metadata required in every `qou.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
}

/// Connection settings for the external search index.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// URL scheme, `http` or `https`.
    pub scheme: String,
    /// Index host name.
    pub host: String,
    /// Index port.
    pub port: u16,
    /// Credentials: `user:password` for basic auth, anything else is an API key.
    pub credentials: Option<Credentials>,
    /// Name of the products index.
    pub products_index: String,
    /// Name of the completion suggestions index.
    pub suggestions_index: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 9200,
            credentials: None,
            products_index: "products_index".to_string(),
            suggestions_index: "suggestions_index".to_string(),
        }
    }
}

impl IndexConfig {
    /// Returns the base URL of the index, e.g. `http://localhost:9200`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Credentials for the search index.
///
/// Parsed from a single string. The secret is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Credentials {
    /// HTTP basic authentication.
    Basic {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },
    /// An encoded API key sent as `Authorization: ApiKey <key>`.
    ApiKey(String),
}

impl From<String> for Credentials {
    fn from(s: String) -> Self {
        match s.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Credentials::Basic {
                username: user.to_string(),
                password: pass.to_string(),
            },
            _ => Credentials::ApiKey(s),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::ApiKey(_) => f.debug_tuple("ApiKey").field(&"[REDACTED]").finish(),
        }
    }
}

/// Bounded connection pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrent outstanding requests.
    pub max_connections: usize,
    /// How long a request may wait for a free connection, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            timeout_ms: 5_000,
        }
    }
}

impl PoolConfig {
    /// The pool wait timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry policy for transient index failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds. Doubles on each retry.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Per-request settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Timeout applied to every outbound request, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl RequestConfig {
    /// The request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The external transformation that produces the artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
    /// Logical artifact name recorded in the generation manifest.
    #[serde(default = "default_artifact_name")]
    pub artifact: String,
    /// Program and arguments to run, e.g. `["python3", "build_patterns.py"]`.
    pub command: Vec<String>,
    /// Optional command run before `command`, e.g. installing requirements.
    #[serde(default)]
    pub setup: Option<Vec<String>>,
    /// Declared input files, in fingerprint order.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Declared output file written by `command`.
    pub output: PathBuf,
}

fn default_artifact_name() -> String {
    "patterns".to_string()
}

/// Where the packaged artifact is placed for the runtime loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Resource directory, relative to the project root.
    pub resource_dir: PathBuf,
    /// Logical resource name the runtime loads.
    pub name: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("resources"),
            name: "patterns.qou".to_string(),
        }
    }
}

/// Catalog seeding sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Products CSV (`product_id,product_name,aisle_id,department_id`).
    pub products: PathBuf,
    /// Aisles CSV (`aisle_id,aisle`).
    pub aisles: PathBuf,
    /// Number of documents per bulk request.
    pub batch_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            products: PathBuf::from("data/products.csv"),
            aisles: PathBuf::from("data/aisles.csv"),
            batch_size: 10_000,
        }
    }
}
