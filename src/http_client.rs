use crate::configuration::ClientConfig;
use hyper::{client::HttpConnector, Body, Client};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_timeout::TimeoutConnector;

/// The client shared by all backends. Speaks plain HTTP and HTTPS and keeps idle connections
/// pooled per backend.
pub type HttpClient = Client<TimeoutConnector<HttpsConnector<HttpConnector>>, Body>;

pub fn build(config: &ClientConfig) -> HttpClient {
  let mut http_connector = HttpConnector::new();
  // https targets are handed to the tls layer instead of being rejected
  http_connector.enforce_http(false);
  let https_connector = HttpsConnectorBuilder::new()
    .with_webpki_roots()
    .https_or_http()
    .enable_http1()
    .wrap_connector(http_connector);

  let mut connector = TimeoutConnector::new(https_connector);
  connector.set_connect_timeout(config.connect_timeout());
  connector.set_read_timeout(config.read_timeout());
  connector.set_write_timeout(config.write_timeout());

  let mut client_builder = Client::builder();
  if let Some(pool_idle_timeout) = config.pool_idle_timeout() {
    client_builder.pool_idle_timeout(pool_idle_timeout);
  }
  if let Some(pool_max_idle_per_host) = config.pool_max_idle_per_host {
    client_builder.pool_max_idle_per_host(pool_max_idle_per_host);
  }
  client_builder.build(connector)
}
