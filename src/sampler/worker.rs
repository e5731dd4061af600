//! Owned handles for the background worker threads.

use std::thread;

/// A named worker thread that is always joined before release.
///
/// Replaces raw handle + manual join bookkeeping: `join` blocks until the
/// worker's current loop iteration completes and the thread exits, and
/// `Drop` joins on every remaining exit path.
#[derive(Debug, Default)]
pub(crate) struct WorkerHandle {
    handle: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn idle() -> Self {
        Self { handle: None }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawns the worker under `name`. Panics only if the OS refuses to
    /// create a thread.
    pub fn spawn<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        debug_assert!(self.handle.is_none());
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .unwrap_or_else(|e| panic!("failed to spawn {name} thread: {e}"));
        self.handle = Some(handle);
    }

    /// Blocks until the worker exits. A panic that escaped the worker is
    /// re-raised here; the engine does not recover or restart workers.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(payload) = handle.join()
        {
            std::panic::resume_unwind(payload);
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Drop must not unwind; an explicit join() re-raises worker panics.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
