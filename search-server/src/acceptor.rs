//! Connection acceptor and admission control.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use engine::{CorpusProvider, InvertedIndex, Task, TaskQueue, WorkerPool};

use crate::session;

/// Accepts connections, enforces `max_active_clients`, and parks overflow
/// sockets in a waiting queue drained as admission slots free up.
///
/// State machine of a connection slot: accepted -> (admitted | waiting)
/// -> running -> finished. A socket moves from waiting to running exactly
/// once, when promoted by a finishing session.
pub struct Acceptor {
    listener: TcpListener,
    running: Arc<AtomicBool>,
    max_active_clients: usize,
    // A single lock around the active count so "check capacity then
    // admit" (in `admit`) and "free a slot then maybe promote a waiter"
    // (in `session_task`'s completion) never interleave — without it two
    // concurrently-finishing sessions could both see a free slot and
    // push `active_clients` past `max_active_clients`.
    active_clients: Arc<Mutex<usize>>,
    waiting_queue: Arc<TaskQueue>,
    client_pool: Arc<WorkerPool>,
    index: Arc<InvertedIndex>,
    corpus: Arc<dyn CorpusProvider>,
}

impl Acceptor {
    pub fn bind(
        port: u16,
        max_active_clients: usize,
        client_pool: Arc<WorkerPool>,
        index: Arc<InvertedIndex>,
        corpus: Arc<dyn CorpusProvider>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        Ok(Self {
            listener,
            running: Arc::new(AtomicBool::new(true)),
            max_active_clients,
            active_clients: Arc::new(Mutex::new(0)),
            waiting_queue: Arc::new(TaskQueue::new()),
            client_pool,
            index,
            corpus,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Accepts connections until the running flag is cleared. [`shutdown`]
    /// connects to the listener once to unblock the final `accept` call.
    ///
    /// [`shutdown`]: Acceptor::shutdown
    pub fn run(&self) {
        while self.running.load(Ordering::SeqCst) {
            let (stream, addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(_) => {
                    if self.running.load(Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            info!("client connected: {}", addr);
            self.admit(stream);
        }
    }

    /// Stops the accept loop. `accept()` only returns when a new
    /// connection arrives, so this dials the listener once itself to
    /// unblock a thread currently parked in `run()`.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(addr) = self.listener.local_addr() {
            let _ = TcpStream::connect(addr);
        }
    }

    fn admit(&self, stream: TcpStream) {
        let active = self.active_clients.clone();
        let waiting_queue = self.waiting_queue.clone();
        let client_pool = self.client_pool.clone();
        let index = self.index.clone();
        let corpus = self.corpus.clone();

        let admitted = {
            let mut active = self.active_clients.lock();
            if *active < self.max_active_clients {
                *active += 1;
                true
            } else {
                false
            }
        };

        if admitted {
            self.client_pool.add_task(session_task(
                stream,
                index,
                corpus,
                active,
                waiting_queue,
                client_pool,
                self.max_active_clients,
            ));
        } else {
            let mut stream = stream;
            use std::io::Write;
            let _ = stream.write_all(b"SERVER_BUSY\n");

            self.waiting_queue.emplace(session_task(
                stream,
                index,
                corpus,
                active,
                waiting_queue.clone(),
                client_pool,
                self.max_active_clients,
            ));
            debug!("client queued, waiting queue size: {}", self.waiting_queue.size());
        }
    }
}

/// Builds the task that runs one session and, on completion, decrements
/// the active-client count and promotes the next waiter if any.
///
/// The decrement and the capacity check for promotion happen under the
/// same lock as `admit`'s own check-and-increment, so a freshly accepted
/// connection and a just-finished session can never both claim the same
/// freed slot.
fn session_task(
    stream: TcpStream,
    index: Arc<InvertedIndex>,
    corpus: Arc<dyn CorpusProvider>,
    active_clients: Arc<Mutex<usize>>,
    waiting_queue: Arc<TaskQueue>,
    client_pool: Arc<WorkerPool>,
    max_active_clients: usize,
) -> Task {
    Task::new(move || {
        session::handle_connection(stream, index, corpus);

        let promoted = {
            let mut active = active_clients.lock();
            *active -= 1;
            info!("client disconnected (active: {})", *active);

            if *active < max_active_clients {
                waiting_queue.try_pop().map(|next| {
                    *active += 1;
                    next
                })
            } else {
                None
            }
        };

        if let Some(next) = promoted {
            client_pool.add_task(next);
        }
    })
}
