//! Idle-timeout reads over the shell output queue.
//!
//! The device never says "done". A read ends once the queue has stayed empty
//! for one full `max_idle` window, at most one window after the last chunk.
//! Slow links or pagers that pause longer than `max_idle` end a read early,
//! and output that never pauses keeps a read going forever unless a deadline
//! variant is used.

use super::*;
use super::mux::ReadQueue;

/// Drains `queue` into `out` until it has been idle for `max_idle`, or until a
/// chunk contains one of `expects`.
///
/// The matching chunk is appended before returning. `out` holds the partial
/// capture if the future is dropped early.
pub(crate) async fn collect(
    queue: &mut ReadQueue,
    max_idle: Duration,
    expects: &[&str],
    out: &mut String,
    log: LogConfig,
) {
    let mut idle_round_tripped = false;
    loop {
        match queue.try_next() {
            Some(chunk) => {
                idle_round_tripped = false;
                out.push_str(&chunk);
                if let Some(hit) = expects.iter().find(|expect| chunk.contains(**expect)) {
                    debug_if!(log, "Found expected {:?} in output", hit);
                    return;
                }
            }
            None if idle_round_tripped => return,
            None => {
                tokio::time::sleep(max_idle).await;
                idle_round_tripped = true;
            }
        }
    }
}

impl Session {
    /// Reads until no output has arrived for `max_idle`.
    pub async fn read_until_idle(&mut self, max_idle: Duration) -> String {
        self.read_until_any_of(max_idle, &[]).await
    }

    /// Reads until a chunk contains any of `expects`, or until no output has
    /// arrived for `max_idle`. Never blocks forever on a quiet shell.
    pub async fn read_until_any_of(&mut self, max_idle: Duration, expects: &[&str]) -> String {
        debug_if!(
            self.config.log,
            "{} Reading <max_idle={:?}, expects={:?}>",
            self.label,
            max_idle,
            expects
        );
        self.touch();
        let mut out = String::new();
        collect(&mut self.mux.reads, max_idle, expects, &mut out, self.config.log).await;
        self.touch();
        out
    }

    /// [`read_until_idle`](Self::read_until_idle) bounded by `deadline`.
    ///
    /// Fails with [`SessionError::ReadTimeout`] carrying the partial output if
    /// the shell is still producing output when the deadline expires.
    pub async fn read_until_idle_within(
        &mut self,
        max_idle: Duration,
        deadline: Duration,
    ) -> Result<String, SessionError> {
        self.read_until_any_of_within(max_idle, &[], deadline).await
    }

    /// [`read_until_any_of`](Self::read_until_any_of) bounded by `deadline`.
    pub async fn read_until_any_of_within(
        &mut self,
        max_idle: Duration,
        expects: &[&str],
        deadline: Duration,
    ) -> Result<String, SessionError> {
        self.touch();
        let mut out = String::new();
        let log = self.config.log;
        let finished = tokio::time::timeout(
            deadline,
            collect(&mut self.mux.reads, max_idle, expects, &mut out, log),
        )
        .await
        .is_ok();
        self.touch();
        if finished {
            Ok(out)
        } else {
            error!("{} Read deadline of {:?} exceeded", self.label, deadline);
            Err(SessionError::ReadTimeout(out))
        }
    }
}
