use crate::load_balancing::PoolError;
use clap::{Arg, ArgMatches, Command};
use hyper::{http::uri::InvalidUri, Uri};
use log::info;
use serde::Deserialize;
use std::{
  fs, io,
  net::{AddrParseError, SocketAddr},
  num::ParseIntError,
  path::{Path, PathBuf},
  time::Duration,
};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";

#[derive(Debug, Error)]
pub enum ConfigurationError {
  #[error("could not read configuration file {}: {source}", .path.display())]
  Read { path: PathBuf, source: io::Error },
  #[error("could not parse configuration file {}: {source}", .path.display())]
  Parse { path: PathBuf, source: toml::de::Error },
  #[error("no backend addresses configured")]
  NoBackends,
  #[error("backend address {address:?} is not a valid absolute URI: {source}")]
  InvalidAddress { address: String, source: url::ParseError },
  #[error("backend address {address:?} has unsupported scheme {scheme:?}, expected http or https")]
  UnsupportedScheme { address: String, scheme: String },
  #[error("backend address {0:?} does not name a host")]
  MissingHost(String),
  #[error("backend address {address:?} cannot be used as request target: {source}")]
  InvalidUri { address: String, source: InvalidUri },
  #[error("invalid listen address {address:?}: {source}")]
  ListenAddress { address: String, source: AddrParseError },
  #[error("invalid port {port:?}: {source}")]
  Port { port: String, source: ParseIntError },
  #[error(transparent)]
  Pool(#[from] PoolError),
}

pub fn command() -> Command<'static> {
  Command::new(env!("CARGO_PKG_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .arg(
      Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .takes_value(true)
        .help("TOML configuration file, defaults to ./config.toml when it exists"),
    )
    .arg(
      Arg::new("listen")
        .short('l')
        .long("listen")
        .value_name("ADDRESS")
        .takes_value(true)
        .help("Socket address to accept requests on"),
    )
    .arg(
      Arg::new("port")
        .short('p')
        .long("port")
        .value_name("PORT")
        .takes_value(true)
        .help("Port to accept requests on, overrides the port of the listen address"),
    )
    .arg(
      Arg::new("backend")
        .short('b')
        .long("backend")
        .value_name("URL")
        .takes_value(true)
        .multiple_occurrences(true)
        .help("Backend to forward requests to, may be repeated; replaces the backends of the file"),
    )
}

/// Command line values that take precedence over the configuration file.
#[derive(Debug, Default)]
pub struct Arguments {
  pub config_path: Option<PathBuf>,
  pub listen_address: Option<String>,
  pub port: Option<String>,
  pub backends: Vec<String>,
}

impl Arguments {
  pub fn from_matches(matches: &ArgMatches) -> Arguments {
    Arguments {
      config_path: matches.value_of("config").map(PathBuf::from),
      listen_address: matches.value_of("listen").map(String::from),
      port: matches.value_of("port").map(String::from),
      backends: matches
        .values_of("backend")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default(),
    }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
  listen_address: Option<String>,
  #[serde(default)]
  backends: Vec<String>,
  #[serde(default)]
  client: ClientConfig,
}

impl FileConfig {
  fn read(path: &Path) -> Result<FileConfig, ConfigurationError> {
    let toml_str = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config = toml::from_str(&toml_str).map_err(|source| ConfigurationError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    info!("Successfully parsed configuration file {}", path.display());
    Ok(config)
  }
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
  pub pool_idle_timeout_secs: Option<u64>,
  pub pool_max_idle_per_host: Option<usize>,
  pub connect_timeout_ms: Option<u64>,
  pub read_timeout_ms: Option<u64>,
  pub write_timeout_ms: Option<u64>,
}

impl ClientConfig {
  pub fn pool_idle_timeout(&self) -> Option<Duration> {
    self.pool_idle_timeout_secs.map(Duration::from_secs)
  }

  pub fn connect_timeout(&self) -> Option<Duration> {
    self.connect_timeout_ms.map(Duration::from_millis)
  }

  pub fn read_timeout(&self) -> Option<Duration> {
    self.read_timeout_ms.map(Duration::from_millis)
  }

  pub fn write_timeout(&self) -> Option<Duration> {
    self.write_timeout_ms.map(Duration::from_millis)
  }
}

#[derive(Debug)]
pub struct RuntimeConfig {
  pub listen_address: SocketAddr,
  pub backends: Vec<Uri>,
  pub client: ClientConfig,
}

/// Reads the configuration file, if any, and applies the command line on top of it.
pub fn load(arguments: Arguments) -> Result<RuntimeConfig, ConfigurationError> {
  let file_config = match &arguments.config_path {
    Some(path) => FileConfig::read(path)?,
    None if Path::new(DEFAULT_CONFIG_PATH).is_file() => FileConfig::read(Path::new(DEFAULT_CONFIG_PATH))?,
    None => FileConfig::default(),
  };
  resolve(file_config, arguments)
}

fn resolve(file_config: FileConfig, arguments: Arguments) -> Result<RuntimeConfig, ConfigurationError> {
  let listen_address = arguments
    .listen_address
    .or(file_config.listen_address)
    .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
  let mut listen_address: SocketAddr = listen_address
    .parse()
    .map_err(|source| ConfigurationError::ListenAddress {
      address: listen_address.clone(),
      source,
    })?;
  if let Some(port) = arguments.port {
    listen_address.set_port(port.parse().map_err(|source| ConfigurationError::Port { port, source })?);
  }

  let backends = if arguments.backends.is_empty() {
    file_config.backends
  } else {
    arguments.backends
  };
  if backends.is_empty() {
    return Err(ConfigurationError::NoBackends);
  }
  let backends = backends
    .iter()
    .map(|address| parse_backend_address(address))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(RuntimeConfig {
    listen_address,
    backends,
    client: file_config.client,
  })
}

fn parse_backend_address(address: &str) -> Result<Uri, ConfigurationError> {
  let url = Url::parse(address).map_err(|source| ConfigurationError::InvalidAddress {
    address: address.to_string(),
    source,
  })?;
  if !matches!(url.scheme(), "http" | "https") {
    return Err(ConfigurationError::UnsupportedScheme {
      address: address.to_string(),
      scheme: url.scheme().to_string(),
    });
  }
  if url.host_str().map_or(true, str::is_empty) {
    return Err(ConfigurationError::MissingHost(address.to_string()));
  }
  url.as_str().parse().map_err(|source| ConfigurationError::InvalidUri {
    address: address.to_string(),
    source,
  })
}
