//! Accept loop shared by the SMTP and POP3 servers

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{error, info};

/// Default wait between accept attempts when no client is pending
pub const DEFAULT_ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Stops a running [`Listener`] from another thread.
///
/// Sessions already in progress run to completion.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A listening socket that hands each connection to its own thread
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    accept_poll: Duration,
    shutdown: ShutdownHandle,
}

impl Listener {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Self::from_std(TcpListener::bind(addr)?)
    }

    pub fn from_std(listener: TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            inner: listener,
            accept_poll: DEFAULT_ACCEPT_POLL,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Upper bound on how long a shutdown request goes unnoticed
    pub fn with_accept_poll(mut self, accept_poll: Duration) -> Self {
        self.accept_poll = accept_poll;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shut down.
    ///
    /// `name` labels the connection threads. Failures of a single accept or
    /// session are logged and never stop the loop.
    pub fn run<F>(self, name: &str, handler: F) -> io::Result<()>
    where
        F: Fn(TcpStream, SocketAddr) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        info!(addr = %self.inner.local_addr()?, "{name} server listening");

        while !self.shutdown.is_shutdown() {
            let (stream, peer) = match self.inner.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.accept_poll);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                    thread::sleep(self.accept_poll);
                    continue;
                }
            };

            // Sessions use plain blocking reads
            if let Err(e) = stream.set_nonblocking(false) {
                error!(%peer, error = %e, "Cannot configure connection");
                continue;
            }

            info!(%peer, "Accepted {name} connection");
            let handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("{name}-{peer}"))
                .spawn(move || handler(stream, peer));
            if let Err(e) = spawned {
                error!(%peer, error = %e, "Cannot spawn session thread");
            }
        }

        info!("{name} server stopped");
        Ok(())
    }
}
