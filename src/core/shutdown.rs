use crate::utils::error::Result;
use signal_hook::consts::{SIGABRT, SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::{Handle as SignalsHandle, Signals};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

pub const TERMINATION_SIGNALS: [i32; 3] = [SIGABRT, SIGINT, SIGTERM];

struct SignalListener {
    handle: SignalsHandle,
    thread: Option<JoinHandle<()>>,
}

/// One-shot shutdown notification.
///
/// When installed, the first termination signal cancels the token. Every later one gets the
/// default disposition, so a second Ctrl-C kills a relay that is stuck shutting down.
pub struct ShutdownSignal {
    token: CancellationToken,
    listener: Option<SignalListener>,
}

impl ShutdownSignal {
    pub fn install() -> Result<Self> {
        let received = Arc::new(AtomicBool::new(false));
        for signal in TERMINATION_SIGNALS {
            // Must be registered before the flag itself so the first arrival only sets it.
            flag::register_conditional_default(signal, Arc::clone(&received))?;
            flag::register(signal, Arc::clone(&received))?;
        }

        let mut signals = Signals::new(TERMINATION_SIGNALS)?;
        let handle = signals.handle();
        let token = CancellationToken::new();
        let trigger = token.clone();

        let thread = thread::Builder::new()
            .name("signal-listener".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    tracing::info!("Received signal {}, shutting down", signal);
                    trigger.cancel();
                }
            })?;

        Ok(Self {
            token,
            listener: Some(SignalListener {
                handle,
                thread: Some(thread),
            }),
        })
    }

    /// A signal that only fires through [`ShutdownSignal::trigger`].
    pub fn manual() -> Self {
        Self {
            token: CancellationToken::new(),
            listener: None,
        }
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.handle.close();
            if let Some(thread) = listener.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
