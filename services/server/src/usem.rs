//! §4.4 — the "usem": a coalescing, one-shot edge notifier. `set()` is
//! non-blocking and idempotent between reads; multiple `set()` calls
//! between two `wait()`s collapse to a single wake.

use tokio::sync::mpsc;

pub struct Usem {
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl Usem {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx }
    }

    /// A clonable handle that can only `set()`, for installing into a
    /// course's usem registry without handing out `wait()` access.
    pub fn setter(&self) -> UsemSetter {
        UsemSetter { tx: self.tx.clone() }
    }

    /// Non-blocking, idempotent wake.
    pub fn set(&self) {
        let _ = self.tx.try_send(());
    }

    /// Blocks until at least one `set()` has occurred since the last wake.
    pub async fn wait(&mut self) {
        self.rx.recv().await;
    }
}

impl Default for Usem {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct UsemSetter {
    tx: mpsc::Sender<()>,
}

impl UsemSetter {
    pub fn set(&self) {
        let _ = self.tx.try_send(());
    }
}
