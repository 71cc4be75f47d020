//! X11 socket readiness
//!
//! A blocking mio poll on the X11 file descriptor, run on tokio's blocking
//! pool, wakes the async main loop whenever the server has sent something.
//! Events themselves are read through the window manager's transport.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};
use x11rb::rust_connection::RustConnection;

const SERVER: mio::Token = mio::Token(0);

/// How often the poll thread checks whether it should stop
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Wakes the main loop when the X11 socket becomes readable
///
/// Dropping it stops the background poll within one [`POLL_TIMEOUT`].
pub struct X11Readiness {
    notify: Arc<Notify>,
    _stop: oneshot::Receiver<()>,
}

impl X11Readiness {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Self::watch(conn.stream().as_raw_fd())
    }

    fn watch(fd: RawFd) -> Result<Self> {
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();
        let (guard, stop) = oneshot::channel::<()>();

        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), SERVER, mio::Interest::READABLE)
            .context("Failed to register X11 FD with mio")?;

        tokio::task::spawn_blocking(move || {
            let mut events = mio::Events::with_capacity(1);
            loop {
                if guard.is_closed() {
                    tracing::debug!("X11 socket polling thread shutting down");
                    return;
                }
                if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                    if err.kind() != std::io::ErrorKind::Interrupted {
                        tracing::warn!("X11 socket poll failed: {:?}", err);
                    }
                    continue;
                }
                if events.iter().any(|event| event.token() == SERVER) {
                    task_notify.notify_one();
                }
            }
        });

        Ok(Self {
            notify,
            _stop: stop,
        })
    }

    /// Resolves once the socket has data; a wakeup that arrived while nobody
    /// was waiting is kept, so draining first and waiting second loses nothing
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }
}
