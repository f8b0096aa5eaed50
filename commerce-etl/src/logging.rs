//! Logging configuration and the injected logging capability.
//!
//! The process-wide `tracing` subscriber is installed once at the orchestration
//! boundary through [`setup::init_logging`]. Components never reach for a global
//! logger; they receive an [`EtlLogger`] at construction, which tags every event
//! with the pipeline stage and component that emitted it.

use crate::error::EtlError;
use std::sync::Arc;
use tracing::Level;

/// Logging configuration for pipeline components.
///
/// Controls how chatty components are, so that row-level audit logging can be
/// switched off in production runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for pipeline components
    pub base_level: Level,
    /// Whether to log per-table data operations (row counts, removed duplicates)
    pub log_data_operations: bool,
    /// Whether to log before/after null counts of type coercions
    pub log_coercion_audit: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_data_operations: true,
            log_coercion_audit: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_data_operations: true,
            log_coercion_audit: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_data_operations: false,
            log_coercion_audit: false,
            max_field_length: 128,
        }
    }
}

/// Macro for performance-sensitive debug logging.
///
/// Only evaluates its arguments if debug logging is enabled for the logger.
#[macro_export]
macro_rules! perf_debug {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.config().base_level >= tracing::Level::DEBUG {
            tracing::debug!(
                stage = $logger.stage(),
                component = $logger.component(),
                $($arg)*
            );
        }
    };
}

/// Macro for conditional data operation logging.
#[macro_export]
macro_rules! log_data_op {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.config().log_data_operations {
            tracing::info!(
                stage = $logger.stage(),
                component = $logger.component(),
                $($arg)*
            );
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let mut end = max_length;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &value[..end])
    }
}

/// The logging capability handed to every pipeline component.
///
/// Cloning is cheap: the configuration is shared. Child handles for
/// sub-components are derived with [`EtlLogger::for_component`].
#[derive(Debug, Clone)]
pub struct EtlLogger {
    stage: &'static str,
    component: &'static str,
    config: Arc<LogConfig>,
}

impl EtlLogger {
    /// Creates a logger for a pipeline stage.
    pub fn new(stage: &'static str, config: LogConfig) -> Self {
        Self {
            stage,
            component: stage,
            config: Arc::new(config),
        }
    }

    /// Logger for the extraction stage with default configuration.
    pub fn extraction() -> Self {
        Self::new("extraction", LogConfig::default())
    }

    /// Logger for the transformation stage with default configuration.
    pub fn transformation() -> Self {
        Self::new("transformation", LogConfig::default())
    }

    /// Logger for the loading stage with default configuration.
    pub fn loading() -> Self {
        Self::new("loading", LogConfig::default())
    }

    /// Returns a handle for a named sub-component sharing this configuration.
    pub fn for_component(&self, component: &'static str) -> Self {
        Self {
            stage: self.stage,
            component,
            config: Arc::clone(&self.config),
        }
    }

    /// Returns a handle for another stage sharing this configuration.
    pub fn for_stage(&self, stage: &'static str) -> Self {
        Self {
            stage,
            component: stage,
            config: Arc::clone(&self.config),
        }
    }

    /// Stage this logger reports under.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Component this logger reports under.
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Shared logging configuration.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Logs an error at construction time and hands it back for propagation.
    ///
    /// Every typed failure goes through here, so no failure is silent even if
    /// a caller later discards it.
    pub fn raise(&self, err: impl Into<EtlError>) -> EtlError {
        let err = err.into();
        tracing::error!(
            stage = self.stage,
            component = self.component,
            error.kind = err.kind(),
            "{}",
            truncate_field(&err.to_string(), self.config.max_field_length)
        );
        err
    }

    /// Logs the before/after null counts of a coercion.
    ///
    /// A rise in nulls means unparseable values were silently replaced; that
    /// is surfaced at `WARN`.
    pub fn coercion_audit(&self, table: &str, column: &str, before: usize, after: usize) {
        if !self.config.log_coercion_audit {
            return;
        }
        if after > before {
            tracing::warn!(
                stage = self.stage,
                component = self.component,
                table,
                column,
                nulls.before = before,
                nulls.after = after,
                "Type coercion introduced {} null values",
                after - before
            );
        } else {
            tracing::debug!(
                stage = self.stage,
                component = self.component,
                table,
                column,
                nulls.before = before,
                nulls.after = after,
                "Type coercion kept null count"
            );
        }
    }
}

/// Process-wide subscriber installation for binaries embedding the pipeline.
pub mod setup {
    use crate::error::{EtlError, Result};
    use tracing::Level;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    /// How log lines are rendered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum OutputFormat {
        /// Multi-line human readable output.
        Pretty,
        /// Single-line human readable output.
        Compact,
        /// One JSON object per event, for log shippers.
        Json,
    }

    /// Filter levels and rendering for the subscriber.
    ///
    /// Pipeline events (`commerce_etl` target) and query engine events
    /// (`datafusion` target) are filtered separately from everything else,
    /// since the engine is chatty at debug level.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        pub default_level: Level,
        pub pipeline_level: Level,
        pub engine_level: Level,
        pub format: OutputFormat,
        /// Full directive string replacing the computed one.
        pub directives: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                default_level: Level::INFO,
                pipeline_level: Level::DEBUG,
                engine_level: Level::WARN,
                format: OutputFormat::Compact,
                directives: None,
            }
        }
    }

    impl LoggingConfig {
        /// Scheduled batch runs: stage summaries as JSON.
        pub fn production() -> Self {
            Self {
                default_level: Level::WARN,
                pipeline_level: Level::INFO,
                format: OutputFormat::Json,
                ..Self::default()
            }
        }

        /// Local runs, including per-table data operations.
        pub fn development() -> Self {
            Self {
                default_level: Level::DEBUG,
                engine_level: Level::INFO,
                format: OutputFormat::Pretty,
                ..Self::default()
            }
        }

        /// Default levels rendered as JSON.
        pub fn structured() -> Self {
            Self::default().with_format(OutputFormat::Json)
        }

        pub fn with_pipeline_level(mut self, level: Level) -> Self {
            self.pipeline_level = level;
            self
        }

        pub fn with_engine_level(mut self, level: Level) -> Self {
            self.engine_level = level;
            self
        }

        pub fn with_format(mut self, format: OutputFormat) -> Self {
            self.format = format;
            self
        }

        /// Shorthand toggling between JSON and compact output.
        pub fn with_json_format(self, enabled: bool) -> Self {
            self.with_format(if enabled {
                OutputFormat::Json
            } else {
                OutputFormat::Compact
            })
        }

        pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
            self.directives = Some(directives.into());
            self
        }

        /// Filter directives in `EnvFilter` syntax.
        pub fn filter_directives(&self) -> String {
            match &self.directives {
                Some(directives) => directives.clone(),
                None => format!(
                    "{},commerce_etl={},datafusion={}",
                    level_name(self.default_level),
                    level_name(self.pipeline_level),
                    level_name(self.engine_level),
                ),
            }
        }
    }

    fn level_name(level: Level) -> String {
        level.as_str().to_ascii_lowercase()
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG`, when set and valid, wins over the configured directives.
    /// Returns a configuration error if the directives do not parse or a
    /// subscriber is already installed.
    ///
    /// ```rust,no_run
    /// use commerce_etl::logging::setup::{init_logging, LoggingConfig, OutputFormat};
    ///
    /// init_logging(LoggingConfig::development().with_format(OutputFormat::Json))?;
    /// # Ok::<(), commerce_etl::error::EtlError>(())
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(config.filter_directives()).map_err(|e| {
                EtlError::Configuration(format!("invalid log directives: {e}"))
            })?,
        };

        let layer = match config.format {
            OutputFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
            OutputFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
            OutputFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .map_err(|e| EtlError::Configuration(format!("logging already initialized: {e}")))
    }
}
