use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Mutex, PoisonError},
};

type ReleaseHook = Arc<dyn Fn() + Send + Sync>;

/// Handle delivered with a frame-arrived notification.
///
/// The sensor may reclaim the frame before the handler gets to it, so
/// [`FrameReference::acquire`] can come back empty.
pub struct FrameReference<F> {
    cell: Arc<Mutex<Option<F>>>,
    on_release: Option<ReleaseHook>,
}

impl<F> FrameReference<F> {
    pub fn new(frame: F) -> Self {
        Self::shared(Arc::new(Mutex::new(Some(frame))))
    }

    /// A reference to a frame slot the sensor can still clear.
    pub fn shared(cell: Arc<Mutex<Option<F>>>) -> Self {
        Self {
            cell,
            on_release: None,
        }
    }

    pub fn with_release_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Arc::new(hook));
        self
    }

    /// Takes the frame out of its slot. At most one acquire succeeds.
    pub fn acquire(&self) -> Option<FrameLease<F>> {
        let frame = self
            .cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        Some(FrameLease {
            frame,
            on_release: self.on_release.clone(),
        })
    }
}

impl<F> fmt::Debug for FrameReference<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReference")
            .field("has_release_hook", &self.on_release.is_some())
            .finish_non_exhaustive()
    }
}

/// An acquired frame. The sensor gets it back when the lease drops, on
/// every exit path of the handler.
pub struct FrameLease<F> {
    frame: F,
    on_release: Option<ReleaseHook>,
}

impl<F> Deref for FrameLease<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.frame
    }
}

impl<F> Drop for FrameLease<F> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counted(frame: u32) -> (FrameReference<u32>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let reference = FrameReference::new(frame).with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (reference, released)
    }

    #[test]
    fn lease_releases_on_drop() {
        let (reference, released) = counted(5);
        {
            let lease = reference.acquire().unwrap();
            assert_eq!(*lease, 5);
            assert_eq!(released.load(Ordering::SeqCst), 0);
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_acquire_finds_nothing() {
        let (reference, released) = counted(5);
        drop(reference.acquire());
        assert!(reference.acquire().is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reclaimed_slot_acquires_nothing() {
        let cell = Arc::new(Mutex::new(Some(3u32)));
        let reference = FrameReference::shared(cell.clone());
        cell.lock().unwrap().take();
        assert!(reference.acquire().is_none());
    }

    #[test]
    fn lease_releases_during_unwind() {
        let (reference, released) = counted(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lease = reference.acquire().unwrap();
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
