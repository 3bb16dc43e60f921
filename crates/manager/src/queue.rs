use tokio::sync::mpsc;

/// Capacity-bounded FIFO hand-off queue.
///
/// Enqueue never blocks: a full queue hands the item straight back so the
/// submitter decides its own retry policy. Workers block on `recv` inside a
/// `select!` with the stop signal, so shutdown is honored promptly without a
/// poll-and-sleep loop.
pub struct JobQueue<T> {
    tx: mpsc::Sender<T>,
    rx: tokio::sync::Mutex<mpsc::Receiver<T>>,
}

impl<T> JobQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Attempt to enqueue without waiting. A full queue returns the item in
    /// `Err` so the caller can retry it.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|err| match err {
            mpsc::error::TrySendError::Full(item) => item,
            mpsc::error::TrySendError::Closed(item) => item,
        })
    }

    /// Wait for the next item. `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
