use tokio::sync::watch;

/// Startup readiness barrier: created once, resolved once when the
/// initial session restore completes, never reset. Every API-calling
/// path awaits the gate before its first authenticated call.
pub fn ready_pair() -> (ReadySignal, ReadyGate) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, ReadyGate { rx })
}

#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn resolve(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct ReadyGate {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    /// A gate that is already open; for contexts with no startup phase.
    pub fn open() -> Self {
        let (tx, rx) = watch::channel(true);
        drop(tx);
        Self { rx }
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn ready(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}
