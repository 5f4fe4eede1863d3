//! Core of the search server: a positional inverted index and the
//! thread-pool / task-queue substrate that parallelizes both index
//! construction and (via a second pool owned by the binary crate)
//! client handling.
//!
//! This crate carries no networking code; the TCP acceptor, admission
//! control, and session protocol live in the `search-server` binary
//! crate, which depends on this one the same way a server binary
//! depends on its engine library.

#[macro_use]
extern crate log;

pub mod corpus;
pub mod index;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod snippet;
pub mod task;
pub mod util;

pub use corpus::{CorpusProvider, FsCorpusProvider};
pub use index::{InvertedIndex, SearchResult, WordPosition};
pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use scheduler::RefreshScheduler;
pub use task::Task;
