//! Lifetime of the view that owns a query.

use std::sync::Arc;
use tokio::sync::watch;

/// Torn down when the owning view goes away. Results of fetches still in
/// flight at that point are discarded instead of merged.
#[derive(Debug, Clone)]
pub struct ViewScope {
    torn_down: Arc<watch::Sender<bool>>,
}

impl ViewScope {
    /// Creates a live scope.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            torn_down: Arc::new(tx),
        }
    }

    /// Marks the owning view as gone.
    pub fn teardown(&self) {
        self.torn_down.send_replace(true);
    }

    /// Returns true once torn down.
    pub fn is_torn_down(&self) -> bool {
        *self.torn_down.borrow()
    }

    /// Resolves when the scope is torn down.
    pub async fn torn_down(&self) {
        let mut rx = self.torn_down.subscribe();
        let _ = rx.wait_for(|gone| *gone).await;
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}
