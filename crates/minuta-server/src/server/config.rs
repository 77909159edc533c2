use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the `minuta-server` binary.
///
/// These settings control the HTTP listener, the template store seed, the
/// render backend pool, and the fixed PDF page geometry. All values are
/// parsed from CLI arguments or environment variables, with defaults suitable
/// for a single-host deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "minuta-server",
    version,
    about = "A document generation service: templates in, filled PDFs out"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Path to the JSON file seeding the template store.
    ///
    /// Environment variable: `TEMPLATES_PATH`
    #[arg(long, env = "TEMPLATES_PATH", default_value_t = String::from("templates.json"))]
    pub templates_path: String,

    /// Maximum number of rendering-engine processes alive at once.
    ///
    /// Each render leases exactly one engine; this bounds the memory and CPU
    /// footprint of the Chromium fleet.
    ///
    /// Environment variable: `MAX_BROWSERS`
    #[arg(long, env = "MAX_BROWSERS", default_value_t = 4)]
    pub max_browsers: usize,

    /// Maximum number of callers allowed to queue for an engine when the pool
    /// is at capacity. Only consulted under the `queue` admission policy.
    ///
    /// Environment variable: `QUEUE_DEPTH`
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = 16)]
    pub queue_depth: usize,

    /// Admission policy when the pool is at capacity with no idle engine:
    /// queue (bounded, first-queued first-served) or reject immediately.
    ///
    /// Environment variable: `ADMISSION_POLICY`
    #[arg(long, env = "ADMISSION_POLICY", value_enum, default_value = "reject")]
    pub admission: AdmissionPolicy,

    /// How long a queued caller may wait for an engine before failing with
    /// `acquire_timeout`, in milliseconds.
    ///
    /// Environment variable: `ACQUIRE_TIMEOUT_MS`
    #[arg(long, env = "ACQUIRE_TIMEOUT_MS", default_value_t = 10_000)]
    pub acquire_timeout_ms: u64,

    /// Hard deadline for one render job end to end (acquire + render), in
    /// milliseconds. An engine abandoned at this deadline is discarded, never
    /// reused.
    ///
    /// Environment variable: `RENDER_TIMEOUT_MS`
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value_t = 30_000)]
    pub render_timeout_ms: u64,

    /// Bound on waiting for a loaded document to reach a quiescent network
    /// state before export, in milliseconds. This caps renders of documents
    /// with broken or slow external resource references.
    ///
    /// Environment variable: `QUIESCENCE_TIMEOUT_MS`
    #[arg(long, env = "QUIESCENCE_TIMEOUT_MS", default_value_t = 10_000)]
    pub quiescence_timeout_ms: u64,

    /// How long an idle engine may sit unused before the pool retires it, in
    /// seconds.
    ///
    /// Environment variable: `IDLE_TTL_SECS`
    #[arg(long, env = "IDLE_TTL_SECS", default_value_t = 300)]
    pub idle_ttl_secs: u64,

    /// Interval between idle-retirement sweeps, in seconds.
    ///
    /// Environment variable: `REAP_INTERVAL_SECS`
    #[arg(long, env = "REAP_INTERVAL_SECS", default_value_t = 30)]
    pub reap_interval_secs: u64,

    /// Bound on waiting for in-flight renders to drain at shutdown, in
    /// seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Path to the Chromium binary. Auto-detected when unset.
    ///
    /// Environment variable: `CHROME_PATH`
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Page width in inches. 8.27 is A4 portrait.
    ///
    /// Environment variable: `PAPER_WIDTH_IN`
    #[arg(long, env = "PAPER_WIDTH_IN", default_value_t = 8.27)]
    pub paper_width_in: f64,

    /// Page height in inches. 11.69 is A4 portrait.
    ///
    /// Environment variable: `PAPER_HEIGHT_IN`
    #[arg(long, env = "PAPER_HEIGHT_IN", default_value_t = 11.69)]
    pub paper_height_in: f64,

    /// Margin applied to all four page edges, in inches.
    ///
    /// Environment variable: `PDF_MARGIN_IN`
    #[arg(long, env = "PDF_MARGIN_IN", default_value_t = 0.79)]
    pub margin_in: f64,
}

/// What happens to a caller arriving while the pool is at capacity with no
/// idle engine.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Fail fast with `pool_exhausted`.
    Reject,
    /// Wait in a bounded FIFO queue; a full queue still rejects.
    Queue,
}

/// Render backend pool knobs, validated.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_instances: usize,
    pub queue_depth: usize,
    pub admission: AdmissionPolicy,
    pub acquire_timeout: Duration,
    pub idle_ttl: Duration,
    pub reap_interval: Duration,
    pub shutdown_timeout: Duration,
}

/// Fixed PDF page geometry. Static per deployment, never per request.
#[derive(Debug, Clone)]
pub struct PdfSettings {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
    pub print_background: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub templates_path: PathBuf,
    pub pool: PoolConfig,
    pub pdf: PdfSettings,
    pub render_timeout: Duration,
    pub quiescence_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_browsers == 0 {
            bail!("MAX_BROWSERS must be greater than 0");
        }

        if args.admission == AdmissionPolicy::Queue && args.queue_depth == 0 {
            bail!("QUEUE_DEPTH must be at least 1 under the queue admission policy");
        }

        if args.render_timeout_ms == 0 || args.quiescence_timeout_ms == 0 {
            bail!("RENDER_TIMEOUT_MS and QUIESCENCE_TIMEOUT_MS must be greater than 0");
        }

        if args.paper_width_in <= 0.0 || args.paper_height_in <= 0.0 || args.margin_in < 0.0 {
            bail!("page geometry must be positive (margins may be zero)");
        }

        Ok(Self {
            server_addr: args.server_addr,
            templates_path: PathBuf::from(args.templates_path),
            pool: PoolConfig {
                max_instances: args.max_browsers,
                queue_depth: args.queue_depth,
                admission: args.admission,
                acquire_timeout: Duration::from_millis(args.acquire_timeout_ms),
                idle_ttl: Duration::from_secs(args.idle_ttl_secs),
                reap_interval: Duration::from_secs(args.reap_interval_secs.max(1)),
                shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            },
            pdf: PdfSettings {
                paper_width_in: args.paper_width_in,
                paper_height_in: args.paper_height_in,
                margin_in: args.margin_in,
                print_background: true,
            },
            render_timeout: Duration::from_millis(args.render_timeout_ms),
            quiescence_timeout: Duration::from_millis(args.quiescence_timeout_ms),
            chrome_path: args.chrome_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("minuta-server").chain(extra.iter().copied()))
    }

    #[test]
    fn defaults_validate() {
        let config = ServerConfig::try_from(args(&[])).expect("defaults must be valid");
        assert_eq!(config.pool.max_instances, 4);
        assert_eq!(config.pool.admission, AdmissionPolicy::Reject);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ServerConfig::try_from(args(&["--max-browsers", "0"])).unwrap_err();
        assert!(err.to_string().contains("MAX_BROWSERS"));
    }

    #[test]
    fn queue_policy_requires_queue_depth() {
        let err = ServerConfig::try_from(args(&["--admission", "queue", "--queue-depth", "0"]))
            .unwrap_err();
        assert!(err.to_string().contains("QUEUE_DEPTH"));
    }
}
