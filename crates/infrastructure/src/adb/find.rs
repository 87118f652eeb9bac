use ferrous_adb_domain::{CompletionEvent, FindOptions};
use tokio::sync::mpsc;

/// A single outstanding caller interest in a name (BIND9's `dns_adbfind_t`).
/// Lives in its own global slotmap rather than hanging off a `NameEntry`'s
/// intrusive list, so `destroyFind`/`cancelFind` never need to know which
/// bucket the name landed in.
pub struct FindEntry {
    pub name: String,
    pub options: FindOptions,
    pub event_tx: Option<mpsc::UnboundedSender<CompletionEvent>>,
    pub event_sent: bool,
    pub canceled: bool,
}

impl FindEntry {
    /// Delivers the event exactly once; a second call (e.g. cancel racing
    /// completion) is a no-op.
    pub fn deliver(&mut self, event: CompletionEvent) {
        if self.event_sent {
            return;
        }
        if let Some(tx) = &self.event_tx {
            // A closed receiver means the caller already dropped its task
            // mailbox; nothing left to notify.
            let _ = tx.send(event);
        }
        self.event_sent = true;
    }
}
