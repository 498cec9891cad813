use crate::{
  error_response::{handle_bad_gateway, handle_service_unavailable},
  listeners::RemoteAddress,
  load_balancing::Balancer,
};
use futures::{Future, TryFutureExt};
use hyper::{
  server::accept::Accept,
  service::{make_service_fn, Service},
  Body, Request, Response, Server,
};
use log::{debug, info};
use std::{
  error::Error,
  io,
  net::SocketAddr,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite};

/// Serves every connection from `acceptor` until `shutdown` resolves, then waits for the
/// requests in flight to finish.
pub async fn create<I, IE, IO, F>(acceptor: I, balancer: Arc<Balancer>, shutdown: F) -> Result<(), io::Error>
where
  I: Accept<Conn = IO, Error = IE>,
  IE: Into<Box<dyn Error + Send + Sync>>,
  IO: AsyncRead + AsyncWrite + Unpin + Send + RemoteAddress + 'static,
  F: Future<Output = ()>,
{
  let service = make_service_fn(move |stream: &IO| {
    let service = stream.remote_addr().map(|client_address| MainService {
      client_address,
      balancer: balancer.clone(),
    });
    async move { service }
  });
  Server::builder(acceptor)
    .serve(service)
    .with_graceful_shutdown(shutdown)
    .map_err(|e| {
      let msg = format!("Failed to listen server: {}", e);
      io::Error::new(io::ErrorKind::Other, msg)
    })
    .await
}

pub struct MainService {
  client_address: SocketAddr,
  balancer: Arc<Balancer>,
}

impl Service<Request<Body>> for MainService {
  type Response = Response<Body>;
  type Error = hyper::Error;

  // let's allow this complex type. A refactor would make it more complicated due to the used trait types
  #[allow(clippy::type_complexity)]
  type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

  fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
    Poll::Ready(Ok(()))
  }

  fn call(&mut self, request: Request<Body>) -> Self::Future {
    debug!("{:?} {} {}", request.version(), request.method(), request.uri());

    let balancer = self.balancer.clone();
    let client_address = self.client_address;
    Box::pin(async move { Ok(dispatch(&balancer, request, &client_address).await) })
  }
}

/// Sends `request` to exactly one backend chosen by `balancer` and answers with its response.
/// Without a live backend the answer is `503 Service Unavailable`, when the chosen backend
/// cannot be reached it is `502 Bad Gateway`.
pub async fn dispatch(balancer: &Balancer, request: Request<Body>, client_address: &SocketAddr) -> Response<Body> {
  let backend = match balancer.select_next() {
    Ok(backend) => backend,
    Err(e) => return handle_service_unavailable(e),
  };

  info!("forwarding request to address {}", backend.address());
  backend
    .forward(request, client_address)
    .await
    .unwrap_or_else(handle_bad_gateway)
}
