use std::sync::{Mutex, PoisonError};

/// Rotation cursor shared by all request handlers.
///
/// The cursor is always kept below the candidate count, so it can be used as an index directly.
#[derive(Debug, Default)]
pub struct RoundRobin {
  cursor: Mutex<usize>,
}

impl RoundRobin {
  pub fn new() -> RoundRobin {
    RoundRobin::default()
  }

  /// Scans `candidates` circularly from the cursor and returns the index of the first one for
  /// which `is_alive` holds. The cursor moves one position for every candidate examined, so a
  /// skipped candidate still shifts the starting point of the next call. Gives up after one full
  /// circle.
  pub fn select<T, F>(&self, candidates: &[T], is_alive: F) -> Option<usize>
  where
    F: Fn(&T) -> bool,
  {
    let len = candidates.len();
    // a panic while holding the lock cannot leave the cursor out of range, so keep using it
    let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

    for _ in 0..len {
      let index = *cursor % len;
      *cursor = (index + 1) % len;
      if is_alive(&candidates[index]) {
        return Some(index);
      }
    }
    None
  }

  #[cfg(test)]
  pub fn cursor(&self) -> usize {
    *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
