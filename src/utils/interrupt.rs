use std::future::Future;
use tokio::sync::watch;
use tracing::{error, warn};

/// Exit status used when a second interrupt cuts the run short
pub const FORCED_EXIT_CODE: i32 = 130;

/// Why the interrupt watcher returned
#[derive(Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// A second interrupt arrived before the run finished
    Forced,
    /// The signal source failed; interrupts are no longer observed
    Unavailable,
}

/// The first interrupt sends `true` on `stop` so the run drains what it has.
/// A second one returns `Interrupt::Forced` and the caller should exit.
pub async fn watch_interrupts<S, Fut>(
    mut next_interrupt: S,
    stop: watch::Sender<bool>,
) -> Interrupt
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        error!("Failed to listen for interrupt signal: {}", e);
        return Interrupt::Unavailable;
    }

    warn!("Interrupt received, stopping at the next tick boundary (interrupt again to exit now)");
    let _ = stop.send(true);

    match next_interrupt().await {
        Ok(()) => {
            warn!("Second interrupt received, exiting before the run finished");
            Interrupt::Forced
        }
        Err(e) => {
            error!("Failed to listen for interrupt signal: {}", e);
            Interrupt::Unavailable
        }
    }
}
