use std::sync::{Arc, PoisonError, RwLock};

/// A value written by one sync thread and read from anywhere.
///
/// Readers always get a consistent copy of the last value written; clones
/// share the same underlying value.
#[derive(Debug, Default)]
pub struct Published<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Published<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Snapshot {
        frames: u32,
        running: bool,
    }

    #[test]
    fn test_clones_share_value() {
        let published = Published::new(Snapshot::default());
        let reader = published.clone();

        published.update(|s| {
            s.frames = 12;
            s.running = true;
        });
        assert_eq!(
            reader.get(),
            Snapshot {
                frames: 12,
                running: true
            }
        );
    }

    #[test]
    fn test_concurrent_writes_are_not_torn() {
        let published = Published::new(Snapshot::default());
        let writer = published.clone();
        let handle = thread::spawn(move || {
            for frames in 0..1000 {
                writer.set(Snapshot {
                    frames,
                    running: frames % 2 == 0,
                });
            }
        });

        for _ in 0..1000 {
            let snapshot = published.get();
            assert_eq!(snapshot.running, snapshot.frames % 2 == 0);
        }
        handle.join().unwrap();
    }
}
