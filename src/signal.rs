//! Bridge from process termination signals to job cancellation
//!
//! SIGINT and SIGTERM are turned into a cancellation of the root token; each
//! supervisor runs under a child of that token, so one signal requests
//! termination of every active job without the handler touching any job's
//! internals. The handler only requests; the reap still happens on each
//! supervisor's own exit-wait path.

use std::io;
use std::thread;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct SignalBridge {
    root: CancellationToken,
}

impl SignalBridge {
    /// Register handlers for SIGINT and SIGTERM on a background thread.
    ///
    /// Repeated signals log again but are otherwise no-ops: the token stays
    /// cancelled and supervisors finish their own cleanup paths.
    pub fn install(root: CancellationToken) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let token = root.clone();

        thread::spawn(move || {
            for sig in signals.forever() {
                let name = match sig {
                    SIGINT => "SIGINT",
                    SIGTERM => "SIGTERM",
                    _ => "signal",
                };
                warn!("received {name}, requesting termination of active jobs");
                token.cancel();
            }
        });

        Ok(Self { root })
    }

    /// Token for one supervised job; cancelling it stops only that job,
    /// while a signal (or [`request_stop_all`](Self::request_stop_all))
    /// cancels every token handed out.
    pub fn job_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Programmatic equivalent of a termination signal.
    pub fn request_stop_all(&self) {
        self.root.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.root.is_cancelled()
    }
}
