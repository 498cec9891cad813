use crate::backend::Backend;
use hyper::Uri;
use round_robin::RoundRobin;
use std::sync::Arc;
use thiserror::Error;

pub mod round_robin;

#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
  #[error("the backend pool needs at least one backend")]
  Empty,
  #[error("backend address {0} is configured more than once")]
  DuplicateAddress(Uri),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("none of the {pool_size} backends is alive")]
pub struct NoLiveBackend {
  pub pool_size: usize,
}

/// Owns the backend pool and hands out backends in round-robin order, skipping the ones that
/// report themselves as not alive.
#[derive(Debug)]
pub struct Balancer {
  backends: Vec<Arc<dyn Backend>>,
  rotation: RoundRobin,
}

impl Balancer {
  pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Balancer, PoolError> {
    if backends.is_empty() {
      return Err(PoolError::Empty);
    }
    for (index, backend) in backends.iter().enumerate() {
      if backends[..index].iter().any(|other| other.address() == backend.address()) {
        return Err(PoolError::DuplicateAddress(backend.address().clone()));
      }
    }

    Ok(Balancer {
      backends,
      rotation: RoundRobin::new(),
    })
  }

  pub fn select_next(&self) -> Result<Arc<dyn Backend>, NoLiveBackend> {
    self
      .rotation
      .select(&self.backends, |backend| backend.is_alive())
      .map(|index| self.backends[index].clone())
      .ok_or(NoLiveBackend {
        pool_size: self.backends.len(),
      })
  }

  pub fn backends(&self) -> &[Arc<dyn Backend>] {
    &self.backends
  }
}
