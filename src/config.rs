use crate::contract::SpecificationVersion;
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};

/// Name of the environment variable overriding the default [`BodyPrintLimit`].
pub const BODY_PRINT_LIMIT_ENV: &str = "PACTMOCK_BODY_PRINT_LIMIT";

static DEFAULT_LOG_LEVEL: OnceCell<LevelFilter> = OnceCell::new();

/// Set the process-wide default log level of the library.
///
/// Only the first call has an effect: it returns `false` if a level had already been set.
/// The level becomes the default of every [`MockProviderConfig`] created afterwards and the
/// maximum level of the [`log`] facade.
pub fn init_log_level(level: LevelFilter) -> bool {
    let mut initialized = false;
    DEFAULT_LOG_LEVEL.get_or_init(|| {
        initialized = true;
        log::set_max_level(level);
        level
    });
    initialized
}

/// The default log level: the one passed to [`init_log_level`], `Info` otherwise.
pub fn default_log_level() -> LevelFilter {
    DEFAULT_LOG_LEVEL.get().copied().unwrap_or(LevelFilter::Info)
}

/// Configuration of a mock provider.
///
/// Only the names of the two participants are mandatory:
/// ```rust
/// use pactmock::{MockProviderConfig, SpecificationVersion};
///
/// let config = MockProviderConfig::new("PactGoProductAPIConsumer", "PactGoProductAPI")
///     .with_specification(SpecificationVersion::V2)
///     .with_pact_dir("target/pacts");
/// assert_eq!(config.host(), "127.0.0.1");
/// assert_eq!(config.port(), 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MockProviderConfig {
    consumer: String,
    provider: String,
    host: String,
    port: u16,
    tls: bool,
    pact_dir: PathBuf,
    specification: SpecificationVersion,
    log_level: LevelFilter,
    body_print_limit: BodyPrintLimit,
}

impl MockProviderConfig {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: false,
            pact_dir: PathBuf::from("pacts"),
            specification: SpecificationVersion::default(),
            log_level: default_log_level(),
            body_print_limit: body_print_limit_from_env(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn pact_dir(&self) -> &Path {
        &self.pact_dir
    }

    pub fn specification(&self) -> SpecificationVersion {
        self.specification
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn body_print_limit(&self) -> BodyPrintLimit {
        self.body_print_limit
    }

    /// The interface the mock provider binds to.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// The port the mock provider binds to. `0` (the default) picks a random free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve over HTTPS, using a self-signed certificate. Needs the `tls` feature.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Where pact files are written. Defaults to `./pacts`.
    pub fn with_pact_dir(mut self, pact_dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = pact_dir.into();
        self
    }

    pub fn with_specification(mut self, specification: SpecificationVersion) -> Self {
        self.specification = specification;
        self
    }

    /// Lifecycle diagnostics of this provider are only logged up to `log_level`.
    pub fn with_log_level(mut self, log_level: LevelFilter) -> Self {
        self.log_level = log_level;
        self
    }

    /// Limit the size of the request bodies printed when a request does not match.
    ///
    /// Defaults to `PACTMOCK_BODY_PRINT_LIMIT` if set, 10,000 bytes otherwise.
    pub fn with_body_print_limit(mut self, body_print_limit: BodyPrintLimit) -> Self {
        self.body_print_limit = body_print_limit;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.consumer.trim().is_empty() {
            return Err("the consumer name cannot be empty".to_string());
        }
        if self.provider.trim().is_empty() {
            return Err("the provider name cannot be empty".to_string());
        }
        if self.host.trim().is_empty() {
            return Err("the host cannot be empty".to_string());
        }
        Ok(())
    }
}

fn body_print_limit_from_env() -> BodyPrintLimit {
    match env::var(BODY_PRINT_LIMIT_ENV) {
        Ok(limit) => limit
            .parse::<usize>()
            .map(BodyPrintLimit::Limited)
            .unwrap_or_else(|_| {
                log::warn!(
                    "Invalid {} value `{}`, using the default of {} bytes",
                    BODY_PRINT_LIMIT_ENV,
                    limit,
                    BODY_PRINT_LIMIT
                );
                BodyPrintLimit::Limited(BODY_PRINT_LIMIT)
            }),
        Err(_) => BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
    }
}
