//! Worker threads that own the database connections.
//!
//! A `rusqlite` statement borrows its connection and cannot leave the thread
//! that prepared it, so each worker opens one connection, prepares the query
//! once, and then runs jobs against it until the executor is dropped. All
//! workers take jobs from one queue; with a single connection every request
//! is serialized on it.

use anyhow::Context as _;
use crossbeam_channel::{bounded, unbounded, Sender};
use rusqlite::Connection;

use crate::PreparedQuery;

type Job = Box<dyn FnOnce(&mut PreparedQuery<'_>) + Send>;

pub struct Executor {
    jobs: Sender<Job>,
    connections: usize,
}

impl Executor {
    /// Start `connections` workers, each with its own connection from `open`
    /// and its own prepared copy of `sql`. Returns once every worker is ready,
    /// or with the first open/prepare failure.
    pub fn spawn<F>(open: F, sql: &str, connections: usize) -> anyhow::Result<Self>
    where
        F: Fn() -> rusqlite::Result<Connection> + Send + Sync + 'static,
    {
        anyhow::ensure!(connections > 0, "at least one connection is required");
        let open = std::sync::Arc::new(open);
        let (jobs, queue) = unbounded::<Job>();
        let mut pending = Vec::with_capacity(connections);
        for idx in 0..connections {
            let (ready_tx, ready_rx) = bounded::<rusqlite::Result<()>>(1);
            let open = open.clone();
            let queue = queue.clone();
            let sql = sql.to_owned();
            std::thread::Builder::new()
                .name(format!("sql-worker-{idx}"))
                .spawn(move || {
                    let conn = match open() {
                        Ok(conn) => conn,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let mut query = match PreparedQuery::prepare(&conn, &sql) {
                        Ok(query) => query,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    for job in queue.iter() {
                        job(&mut query);
                    }
                    tracing::debug!(worker = idx, "job queue closed, worker exiting");
                })
                .context("Unable to start worker thread.")?;
            pending.push(ready_rx);
        }
        for ready in pending {
            ready
                .recv()
                .context("Worker exited before opening the database.")?
                .context("Unable to open the database and prepare the query.")?;
        }
        tracing::info!(connections, "query workers ready");
        Ok(Self { jobs, connections })
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    /// Queue `job` to run on the next free connection.
    pub fn submit(
        &self,
        job: impl FnOnce(&mut PreparedQuery<'_>) + Send + 'static,
    ) -> anyhow::Result<()> {
        self.jobs
            .send(Box::new(job))
            .map_err(|_| anyhow::anyhow!("All query workers have stopped."))
    }

    /// Run `f` on a connection and wait for its result. Blocks the calling
    /// thread, so not for use on the async runtime.
    pub fn call<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut PreparedQuery<'_>) -> T + Send + 'static,
    ) -> anyhow::Result<T> {
        let (tx, rx) = bounded(1);
        self.submit(move |query| {
            let _ = tx.send(f(query));
        })?;
        rx.recv().context("Query worker stopped before answering.")
    }
}
