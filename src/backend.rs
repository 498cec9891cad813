use crate::{
  forwarding::{backend_request, strip_hop_by_hop},
  health::Liveness,
  http_client::HttpClient,
};
use async_trait::async_trait;
use hyper::{http, Body, Request, Response, Uri};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
  #[error("could not build the request for backend {backend}: {source}")]
  Request { backend: Uri, source: http::Error },
  #[error("request to backend {backend} failed: {source}")]
  Transport { backend: Uri, source: hyper::Error },
}

/// One upstream target a request can be forwarded to.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
  fn address(&self) -> &Uri;

  /// Must answer without blocking, see [`Liveness`].
  fn is_alive(&self) -> bool;

  /// Relays `request` to this backend. Failures are reported, never retried.
  async fn forward(
    &self,
    request: Request<Body>,
    client_address: &SocketAddr,
  ) -> Result<Response<Body>, ForwardError>;
}

/// A backend reached over HTTP or HTTPS, acting as a reverse proxy for it.
#[derive(Debug)]
pub struct HttpBackend {
  address: Uri,
  liveness: Arc<dyn Liveness>,
  client: HttpClient,
}

impl HttpBackend {
  pub fn new(address: Uri, liveness: Arc<dyn Liveness>, client: HttpClient) -> HttpBackend {
    HttpBackend {
      address,
      liveness,
      client,
    }
  }
}

#[async_trait]
impl Backend for HttpBackend {
  fn address(&self) -> &Uri {
    &self.address
  }

  fn is_alive(&self) -> bool {
    self.liveness.is_alive()
  }

  async fn forward(
    &self,
    request: Request<Body>,
    client_address: &SocketAddr,
  ) -> Result<Response<Body>, ForwardError> {
    let backend_request =
      backend_request(request, &self.address, client_address).map_err(|source| ForwardError::Request {
        backend: self.address.clone(),
        source,
      })?;

    // dropping this future, e.g. because the client went away, aborts the upstream request
    let mut response = self
      .client
      .request(backend_request)
      .await
      .map_err(|source| ForwardError::Transport {
        backend: self.address.clone(),
        source,
      })?;

    strip_hop_by_hop(response.headers_mut());
    Ok(response)
  }
}

#[cfg(test)]
pub mod mock {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  /// Answers every request itself with its own address as body.
  #[derive(Debug)]
  pub struct MockBackend {
    address: Uri,
    alive: AtomicBool,
    probes: AtomicUsize,
    forwarded: AtomicUsize,
  }

  impl MockBackend {
    pub fn new(address: &str) -> MockBackend {
      MockBackend {
        address: address.parse().unwrap(),
        alive: AtomicBool::new(true),
        probes: AtomicUsize::new(0),
        forwarded: AtomicUsize::new(0),
      }
    }

    pub fn set_alive(&self, alive: bool) {
      self.alive.store(alive, Ordering::SeqCst);
    }

    /// How often the liveness was queried.
    pub fn probes(&self) -> usize {
      self.probes.load(Ordering::SeqCst)
    }

    pub fn forwarded(&self) -> usize {
      self.forwarded.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Backend for MockBackend {
    fn address(&self) -> &Uri {
      &self.address
    }

    fn is_alive(&self) -> bool {
      self.probes.fetch_add(1, Ordering::SeqCst);
      self.alive.load(Ordering::SeqCst)
    }

    async fn forward(
      &self,
      _request: Request<Body>,
      _client_address: &SocketAddr,
    ) -> Result<Response<Body>, ForwardError> {
      self.forwarded.fetch_add(1, Ordering::SeqCst);
      Ok(Response::new(Body::from(self.address.to_string())))
    }
  }
}
