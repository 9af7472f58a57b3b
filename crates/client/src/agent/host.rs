//! The hosting runtime's side of the lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use appshell_core::Error;

/// Operations the agent asks of whatever runtime hosts it.
#[async_trait::async_trait]
pub trait HostRuntime: Send + Sync {
    /// Let the installed version activate without waiting for clients to close.
    async fn skip_waiting(&self) -> Result<(), Error>;

    /// Take control of every open client. Returns how many were claimed.
    async fn claim_clients(&self) -> Result<usize, Error>;
}

/// In-process host used by the MCP server and the CLI.
///
/// There are no browser tabs to take over; it records the requests so they
/// can be reported back to the operator.
#[derive(Debug, Default)]
pub struct LocalHost {
    clients: AtomicUsize,
    skipped_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LocalHost {
    /// A host with `clients` open application instances.
    pub fn with_clients(clients: usize) -> Self {
        Self { clients: AtomicUsize::new(clients), ..Default::default() }
    }

    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HostRuntime for LocalHost {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<usize, Error> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(self.clients.load(Ordering::SeqCst))
    }
}
