//! Shutdown requests
//!
//! Any component can depend on `Arc<Shutdowner>` and ask the app host to
//! begin an orderly shutdown - the "CLI command finished" case. The first
//! termination source to fire wins; later requests are ignored.

use tokio::sync::watch;

/// Handle for requesting application shutdown from inside the graph
#[derive(Debug)]
pub struct Shutdowner {
    tx: watch::Sender<Option<i32>>,
}

impl Shutdowner {
    /// Request shutdown with exit code 0
    pub fn shutdown(&self) {
        self.shutdown_with_code(0);
    }

    /// Request shutdown with the given exit code
    pub fn shutdown_with_code(&self, code: i32) {
        // Send only fails when the app host is already gone.
        let _ = self.tx.send(Some(code));
    }
}

pub(crate) fn channel() -> (Shutdowner, watch::Receiver<Option<i32>>) {
    let (tx, rx) = watch::channel(None);
    (Shutdowner { tx }, rx)
}

/// Wait until a shutdown request arrives and return its exit code; pends
/// forever when the sender disappears without a request
pub(crate) async fn requested(rx: &mut watch::Receiver<Option<i32>>) -> i32 {
    loop {
        if let Some(code) = *rx.borrow_and_update() {
            return code;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
