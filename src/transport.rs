//! The `SendMsg` collaborator (§6): a single blocking conversation with a
//! single peer. Opaque to the core — it is never inspected, only invoked and
//! timed.

use std::error::Error as StdError;

/// Performs one conversation to one peer, blocking until the peer
/// acknowledges application-level receipt or fails. Implementations may
/// panic only as a bug; the core does not catch panics.
pub trait Transport<N, P>: Send + Sync + 'static {
    type Value: Send + 'static;
    type Error: StdError + Send + Sync + 'static;

    fn send(&self, payload: &P, dest: &N) -> Result<Self::Value, Self::Error>;
}

/// Blanket impl so a plain closure can act as a `Transport` in tests and
/// small demos, mirroring how this codebase wraps callback-shaped
/// collaborators.
impl<N, P, V, E, F> Transport<N, P> for F
where
    F: Fn(&P, &N) -> Result<V, E> + Send + Sync + 'static,
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    type Value = V;
    type Error = E;

    fn send(&self, payload: &P, dest: &N) -> Result<V, E> {
        self(payload, dest)
    }
}
