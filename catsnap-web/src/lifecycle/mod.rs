//! Transactional request lifecycle
//!
//! Every request that touches the database does so inside one transaction,
//! begun on first use. Handlers record
//! background jobs instead of sending them; at teardown the transaction is
//! committed or rolled back and the recorded jobs are confirmed or revoked to
//! match, so a job never runs for work that was not committed.

mod finish;
mod scope;
mod session;

pub use finish::{finish_request, LifecycleError, Outcome};
pub use scope::{transactional, RequestScope};
pub use session::{BeginMode, Session, SessionError, SqlxSession};
