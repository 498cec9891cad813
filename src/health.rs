use arc_swap::ArcSwap;
use hyper::StatusCode;
use std::fmt::{self, Debug};

/// Reports whether a backend may currently receive requests.
///
/// Implementations are queried while the balancer holds its rotation lock, so `is_alive` must
/// answer from state that is already at hand and never wait on I/O.
pub trait Liveness: Send + Sync + Debug {
  fn is_alive(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Healthiness {
  Healthy,
  Unresponsive(Option<StatusCode>),
}

impl fmt::Display for Healthiness {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Healthiness::Healthy => write!(f, "Healthy"),
      Healthiness::Unresponsive(Some(status_code)) => write!(f, "Unresponsive, status: {}", status_code),
      Healthiness::Unresponsive(None) => write!(f, "Unresponsive"),
    }
  }
}

/// Liveness set from the outside, e.g. by a health watcher. The balancer only reads it.
///
/// Starts out healthy, so a backend nobody reports on keeps taking traffic.
#[derive(Debug)]
pub struct HealthSignal(ArcSwap<Healthiness>);

impl HealthSignal {
  pub fn new(healthiness: Healthiness) -> HealthSignal {
    HealthSignal(ArcSwap::from_pointee(healthiness))
  }

  pub fn set(&self, healthiness: Healthiness) {
    self.0.store(healthiness.into());
  }

  pub fn healthiness(&self) -> Healthiness {
    self.0.load().as_ref().clone()
  }
}

impl Default for HealthSignal {
  fn default() -> HealthSignal {
    HealthSignal::new(Healthiness::Healthy)
  }
}

impl Liveness for HealthSignal {
  fn is_alive(&self) -> bool {
    self.0.load().as_ref() == &Healthiness::Healthy
  }
}
