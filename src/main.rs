use backend::{Backend, HttpBackend};
use configuration::{Arguments, ConfigurationError, RuntimeConfig};
use health::HealthSignal;
use load_balancing::Balancer;
use log::{error, info};
use std::{io, process, sync::Arc};

mod backend;
mod configuration;
mod error_response;
mod forwarding;
mod health;
mod http_client;
mod listeners;
mod load_balancing;
mod logging;
mod server;

#[tokio::main]
pub async fn main() {
  let _handle = match logging::initialize() {
    Ok(handle) => handle,
    Err(e) => {
      eprintln!("Failed to initialize logging: {}", e);
      process::exit(1);
    }
  };

  let arguments = Arguments::from_matches(&configuration::command().get_matches());
  let (config, balancer) = match configure(arguments) {
    Ok(configured) => configured,
    Err(e) => {
      error!("Invalid configuration: {}", e);
      process::exit(1);
    }
  };

  if let Err(e) = serve(&config, balancer).await {
    error!("{}", e);
    process::exit(1);
  }
}

fn configure(arguments: Arguments) -> Result<(RuntimeConfig, Balancer), ConfigurationError> {
  let config = configuration::load(arguments)?;
  let client = http_client::build(&config.client);
  let backends = config
    .backends
    .iter()
    .map(|address| {
      let backend = HttpBackend::new(address.clone(), Arc::new(HealthSignal::default()), client.clone());
      Arc::new(backend) as Arc<dyn Backend>
    })
    .collect();
  let balancer = Balancer::new(backends)?;
  Ok((config, balancer))
}

async fn serve(config: &RuntimeConfig, balancer: Balancer) -> Result<(), io::Error> {
  let acceptor = listeners::bind(config.listen_address).await?;
  for backend in balancer.backends() {
    info!("balancing over backend {}", backend.address());
  }
  info!("serving requests at '{}'", acceptor.local_address());

  server::create(acceptor, Arc::new(balancer), shutdown_signal()).await?;
  info!("Shut down gracefully");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!("Failed to listen for Ctrl-C: {}", e);
      futures::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        error!("Failed to listen for SIGTERM: {}", e);
        futures::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = futures::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("Shutdown signal received, waiting for requests in flight");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::load_balancing::PoolError;

  fn arguments(args: &[&str]) -> Arguments {
    Arguments::from_matches(&configuration::command().try_get_matches_from(args).unwrap())
  }

  #[test]
  fn configure_builds_balancer_in_order() {
    let (config, balancer) = configure(arguments(&[
      "proxy",
      "-l",
      "127.0.0.1:9000",
      "-b",
      "http://a.localhost",
      "-b",
      "https://b.localhost/api",
    ]))
    .unwrap();

    assert_eq!(config.listen_address, "127.0.0.1:9000".parse().unwrap());
    let addresses: Vec<_> = balancer.backends().iter().map(|backend| backend.address().to_string()).collect();
    assert_eq!(addresses, vec!["http://a.localhost/", "https://b.localhost/api"]);
    assert!(balancer.backends().iter().all(|backend| backend.is_alive()));
  }

  #[test]
  fn configure_rejects_addresses_equal_after_normalization() {
    let result = configure(arguments(&["proxy", "-b", "http://a.localhost", "-b", "http://a.localhost/"]));

    match result {
      Err(ConfigurationError::Pool(PoolError::DuplicateAddress(address))) => {
        assert_eq!(address, "http://a.localhost/".parse::<hyper::Uri>().unwrap())
      }
      _ => panic!("expected a duplicate address error"),
    }
  }
}
