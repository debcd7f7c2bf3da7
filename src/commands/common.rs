//! Common processing logic shared between the scan and reset commands.

use camino::Utf8PathBuf;
use clap::Args;
use clap::ValueEnum;
use embargo_sniffer::Result;
use embargo_sniffer::config::Config;
use embargo_sniffer::fetch::{Credentials, PastaClient};
use embargo_sniffer::registry::PastaRegistry;
use ohno::bail;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Initialize logger based on log level
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug) || matches!(log_level, LogLevel::Trace))
        .init();
}

/// Common arguments shared between the scan and reset commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to configuration file [default: built-in production settings]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Distinguished name used for elevated metadata access
    #[arg(long, value_name = "DN", env = "PASTA_DN")]
    pub pasta_dn: Option<String>,

    /// Password used for elevated metadata access
    #[arg(long, value_name = "PASSWORD", env = "PASTA_PASSWORD", hide_env_values = true)]
    pub pasta_password: Option<String>,

    /// Connection URL of the registry's PostgreSQL database
    #[arg(long, value_name = "URL", env = "PASTA_REGISTRY_URL", hide_env_values = true)]
    pub registry_url: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

pub struct Common {
    pub config: Config,
    credentials: Option<Credentials>,
    registry_url: Option<String>,
}

impl Common {
    /// Create a new Common processor with logger and config
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the credential
    /// arguments are inconsistent.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let config = Config::load(args.config.as_deref())?;

        let credentials = match (&args.pasta_dn, &args.pasta_password) {
            (Some(dn), Some(password)) => Some(Credentials {
                distinguished_name: dn.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => bail!("--pasta-dn and --pasta-password must be provided together"),
        };

        Ok(Self {
            config,
            credentials,
            registry_url: args.registry_url.clone(),
        })
    }

    pub fn fetcher(&self) -> Result<PastaClient> {
        PastaClient::new(&self.config.base_url, self.credentials.clone())
    }

    pub fn registry(&self) -> Result<PastaRegistry> {
        let Some(url) = &self.registry_url else {
            bail!("no registry database configured, supply --registry-url or PASTA_REGISTRY_URL");
        };

        PastaRegistry::connect(url)
    }
}
