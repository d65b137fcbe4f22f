use dfs_lib::{DfsError, DfsResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Opaque identity of one in-flight request, issued by the coordinator.
pub type RequestToken = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct Waiter {
    #[allow(dead_code)]
    token: RequestToken,
    mode: LockMode,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct LockState {
    queue: VecDeque<Waiter>,
    shared: u32,
    exclusive: bool,
}

/// FIFO-fair shared/exclusive lock attached to one namespace node.
///
/// Waiters queue in arrival order and are admitted from the head: a run of
/// shared requests is admitted together while no exclusive hold is active;
/// an exclusive request is admitted only when the node is idle, and while
/// it sits at the head no later shared request can jump past it. Admission
/// is signaled through a oneshot grant, so nobody polls.
///
/// The read counter feeds the replication policy; it is reset exactly when
/// a replica is added.
pub struct LockNode {
    state: Mutex<LockState>,
    read_count: AtomicU64,
}

impl Default for LockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl LockNode {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            read_count: AtomicU64::new(0),
        }
    }

    /// Block until every earlier waiter has been admitted and no exclusive
    /// hold is active, then hold the node shared.
    pub async fn acquire_shared(&self, token: RequestToken) {
        self.acquire(token, LockMode::Shared).await
    }

    /// Block until the node is idle and this request is at the head of the
    /// queue, then hold the node exclusively.
    pub async fn acquire_exclusive(&self, token: RequestToken) {
        self.acquire(token, LockMode::Exclusive).await
    }

    async fn acquire(&self, token: RequestToken, mode: LockMode) {
        let rx = {
            let mut state = self.state.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(Waiter {
                token,
                mode,
                grant: tx,
            });
            Self::pump(&mut state);
            rx
        };
        // The sender stays queued until the grant fires; acquisition has no
        // cancellation, so the channel cannot close early.
        let _ = rx.await;
    }

    pub fn release_shared(&self) -> DfsResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.shared == 0 {
            return Err(DfsError::IllegalState(
                "shared unlock without a shared hold".to_string(),
            ));
        }
        state.shared -= 1;
        Self::pump(&mut state);
        Ok(())
    }

    pub fn release_exclusive(&self) -> DfsResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.exclusive {
            return Err(DfsError::IllegalState(
                "exclusive unlock without an exclusive hold".to_string(),
            ));
        }
        state.exclusive = false;
        Self::pump(&mut state);
        Ok(())
    }

    /// Admit from the head of the queue whatever the hold state permits.
    fn pump(state: &mut LockState) {
        loop {
            let mode = match state.queue.front() {
                Some(waiter) => waiter.mode,
                None => return,
            };
            match mode {
                LockMode::Shared if !state.exclusive => {
                    if let Some(waiter) = state.queue.pop_front() {
                        state.shared += 1;
                        // a grant to a dropped waiter is taken back
                        if waiter.grant.send(()).is_err() {
                            state.shared -= 1;
                        }
                    }
                }
                LockMode::Exclusive if !state.exclusive && state.shared == 0 => {
                    if let Some(waiter) = state.queue.pop_front() {
                        state.exclusive = true;
                        if waiter.grant.send(()).is_err() {
                            state.exclusive = false;
                            continue;
                        }
                    }
                    return;
                }
                _ => return,
            }
        }
    }

    pub fn add_read(&self) {
        self.read_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn reset_read_count(&self) {
        self.read_count.store(0, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn shared_holds(&self) -> u32 {
        self.state.lock().unwrap().shared
    }

    #[cfg(test)]
    pub fn is_exclusive(&self) -> bool {
        self.state.lock().unwrap().exclusive
    }

    #[cfg(test)]
    pub fn queue_len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_shared_holders_are_concurrent() {
        let node = Arc::new(LockNode::new());
        for token in 0..4 {
            node.acquire_shared(token).await;
        }
        assert_eq!(node.shared_holds(), 4);
        for _ in 0..4 {
            node.release_shared().unwrap();
        }
        assert_eq!(node.shared_holds(), 0);
    }

    #[tokio::test]
    async fn test_exclusive_excludes_everyone() {
        let node = Arc::new(LockNode::new());
        node.acquire_exclusive(1).await;
        assert!(node.is_exclusive());

        assert!(timeout(TICK, node.acquire_shared(2)).await.is_err());
        node.release_exclusive().unwrap();
        assert!(!node.is_exclusive());
        assert!(timeout(TICK, node.acquire_shared(3)).await.is_ok());
        assert_eq!(node.shared_holds(), 1);
    }

    #[tokio::test]
    async fn test_queued_exclusive_blocks_later_shared() {
        let node = Arc::new(LockNode::new());
        node.acquire_shared(1).await;

        // an exclusive waiter queues behind the shared holder
        let n2 = node.clone();
        let writer = tokio::spawn(async move { n2.acquire_exclusive(2).await });
        while node.queue_len() == 0 {
            tokio::task::yield_now().await;
        }

        // a later shared request must not jump past the queued exclusive
        assert!(timeout(TICK, node.acquire_shared(3)).await.is_err());

        node.release_shared().unwrap();
        writer.await.unwrap();
        assert!(node.is_exclusive());

        // once the writer is done, shared admission resumes
        node.release_exclusive().unwrap();
        assert!(timeout(TICK, node.acquire_shared(4)).await.is_ok());
        assert_eq!(node.shared_holds(), 1);
    }

    #[tokio::test]
    async fn test_release_without_hold_is_illegal() {
        let node = LockNode::new();
        assert!(matches!(
            node.release_shared(),
            Err(DfsError::IllegalState(_))
        ));
        assert!(matches!(
            node.release_exclusive(),
            Err(DfsError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn test_read_counter() {
        let node = LockNode::new();
        node.add_read();
        node.add_read();
        assert_eq!(node.read_count(), 2);
        node.reset_read_count();
        assert_eq!(node.read_count(), 0);
    }
}
