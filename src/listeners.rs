use async_stream::stream;
use futures::Stream;
use log::error;
use std::{
  io,
  net::SocketAddr,
  pin::Pin,
  task::{Context, Poll},
  time::Duration,
};
use tokio::net::{TcpListener, TcpStream};

// pause before accepting again, e.g. while the process is out of file descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct HyperAcceptor {
  acceptor: Pin<Box<dyn Stream<Item = Result<TcpStream, io::Error>> + Send>>,
  local_address: SocketAddr,
}

impl HyperAcceptor {
  pub fn local_address(&self) -> SocketAddr {
    self.local_address
  }
}

impl hyper::server::accept::Accept for HyperAcceptor {
  type Conn = TcpStream;
  type Error = io::Error;

  fn poll_accept(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Result<Self::Conn, Self::Error>>> {
    Pin::new(&mut self.acceptor).poll_next(cx)
  }
}

pub async fn bind(address: SocketAddr) -> Result<HyperAcceptor, io::Error> {
  let listener = TcpListener::bind(address).await?;
  let local_address = listener.local_addr()?;

  let incoming_stream = stream! {
    loop {
      match listener.accept().await {
        Ok((socket, _)) => yield Ok::<_, io::Error>(socket),
        Err(e) => {
          error!("Failed to accept TCP connection: {}", e);
          tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
        }
      }
    }
  };

  Ok(HyperAcceptor {
    acceptor: Box::pin(incoming_stream),
    local_address,
  })
}

pub trait RemoteAddress {
  fn remote_addr(&self) -> io::Result<SocketAddr>;
}

impl RemoteAddress for TcpStream {
  fn remote_addr(&self) -> io::Result<SocketAddr> {
    self.peer_addr()
  }
}
