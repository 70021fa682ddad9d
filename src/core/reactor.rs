use crate::utils::error::{RelayError, Result};
use std::future::Future;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::{Builder, EnterGuard, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle as TaskHandle;

const REACTOR_THREAD_NAME: &str = "serial-reactor";

/// Single background thread driving every serial channel's reads.
///
/// The thread runs a current-thread tokio runtime, so all read completions (and the callbacks
/// they invoke) are serialized on that one thread.
pub struct Reactor {
    handle: ReactorHandle,
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Cheap, cloneable access to the reactor for spawning reads and opening devices.
#[derive(Clone)]
pub struct ReactorHandle {
    runtime: Handle,
    thread_id: ThreadId,
}

impl Reactor {
    pub fn start() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name(REACTOR_THREAD_NAME)
            .build()
            .map_err(|e| RelayError::ReactorError {
                message: format!("failed to build runtime: {}", e),
            })?;
        let runtime_handle = runtime.handle().clone();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(REACTOR_THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                tracing::debug!("Serial reactor stopped");
            })
            .map_err(|e| RelayError::ReactorError {
                message: format!("failed to spawn reactor thread: {}", e),
            })?;

        let thread_id = thread.thread().id();
        tracing::debug!("Serial reactor started");

        Ok(Self {
            handle: ReactorHandle {
                runtime: runtime_handle,
                thread_id,
            },
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the runtime and joins the reactor thread. Tasks still pending are dropped.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Serial reactor thread panicked");
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ReactorHandle {
    pub fn spawn<F>(&self, future: F) -> TaskHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Enters the reactor's runtime context so devices opened on this thread register with its I/O driver.
    pub fn enter(&self) -> EnterGuard<'_> {
        self.runtime.enter()
    }

    pub fn is_reactor_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_spawned_tasks_run_on_reactor_thread() {
        let mut reactor = Reactor::start().unwrap();
        let handle = reactor.handle();
        let (tx, rx) = mpsc::channel();

        let remote = handle.clone();
        handle.spawn(async move {
            tx.send(remote.is_reactor_thread()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(!handle.is_reactor_thread());
        reactor.stop();
        assert!(!reactor.is_running());
    }

    #[test]
    fn test_stop_drops_pending_tasks() {
        let mut reactor = Reactor::start().unwrap();
        let (tx, rx) = mpsc::channel::<()>();

        reactor.handle().spawn(async move {
            let _keep = tx;
            std::future::pending::<()>().await;
        });

        reactor.stop();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
        reactor.stop();
    }
}
