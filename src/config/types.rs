use serde::Deserialize;

/// Main configuration structure for Orb-Weaver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub budget: WorkerBudget,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    /// Extra wait profiles evaluated before the built-in framework table
    #[serde(rename = "wait-profile", default)]
    pub wait_profiles: Vec<WaitProfileEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            budget: WorkerBudget::default(),
            user_agent: UserAgentConfig::default(),
            wait_profiles: Vec::new(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth for recursive crawls (1 = seed only)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of URLs fetched per depth level
    #[serde(rename = "max-urls-per-level", default = "default_max_urls_per_level")]
    pub max_urls_per_level: usize,

    /// Number of URLs dispatched per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Fetch attempts per URL before giving up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum extracted text length for a fetch to count as successful
    #[serde(rename = "min-content-length", default = "default_min_content_length")]
    pub min_content_length: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_urls_per_level: default_max_urls_per_level(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            min_content_length: default_min_content_length(),
        }
    }
}

/// Resource budget read once at engine start
///
/// All three limits are advisory: exceeding them degrades throughput, never
/// correctness.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerBudget {
    /// Concurrent crawl operations admitted system-wide
    #[serde(rename = "max-operations", default = "default_max_operations")]
    pub max_operations: usize,

    /// In-flight page fetches within one operation
    #[serde(
        rename = "max-pages-per-operation",
        default = "default_max_pages_per_operation"
    )]
    pub max_pages_per_operation: usize,

    /// Concurrent CPU-bound parse workers; 0 sizes the pool from core count
    #[serde(rename = "max-cpu-workers", default)]
    pub max_cpu_workers: usize,

    /// Memory usage percentage above which the page dispatcher is throttled
    #[serde(
        rename = "memory-threshold-percent",
        default = "default_memory_threshold"
    )]
    pub memory_threshold_percent: u8,

    /// CPU usage percentage above which the CPU pool is shrunk
    #[serde(rename = "cpu-threshold-percent", default = "default_cpu_threshold")]
    pub cpu_threshold_percent: u8,

    /// Interval between resource samples taken by the adaptive tuner
    #[serde(rename = "sample-interval-ms", default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for WorkerBudget {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_pages_per_operation: default_max_pages_per_operation(),
            max_cpu_workers: 0,
            memory_threshold_percent: default_memory_threshold(),
            cpu_threshold_percent: default_cpu_threshold(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default)]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: String::new(),
            contact_email: String::new(),
        }
    }
}

/// A configured wait profile: URL pattern, readiness selector, page timeout
#[derive(Debug, Clone, Deserialize)]
pub struct WaitProfileEntry {
    /// Substring matched against the lowercased URL
    pub pattern: String,

    /// CSS selector scoping the page's main content region
    pub selector: String,

    /// Per-request page timeout in milliseconds
    #[serde(rename = "timeout-ms", default = "default_profile_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_urls_per_level() -> usize {
    50
}

fn default_batch_size() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_content_length() -> usize {
    50
}

fn default_max_operations() -> usize {
    4
}

fn default_max_pages_per_operation() -> usize {
    10
}

fn default_memory_threshold() -> u8 {
    80
}

fn default_cpu_threshold() -> u8 {
    90
}

fn default_sample_interval_ms() -> u64 {
    2000
}

fn default_profile_timeout_ms() -> u64 {
    30_000
}

fn default_crawler_name() -> String {
    "orb-weaver".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
