//! Library half of `search-server`: the connection acceptor, admission
//! control, and the per-session protocol handler. Split out of the
//! binary so integration tests can spin up a real `Acceptor` against an
//! ephemeral port without going through `main`.

#[macro_use]
extern crate log;

pub mod acceptor;
pub mod session;

pub use acceptor::Acceptor;
