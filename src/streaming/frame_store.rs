//! Latest-frame slot shared between the capture loop and HTTP readers
//!
//! A single writer replaces the slot under a mutex; readers take a cheap
//! `Bytes` clone so the lock is only held for a refcount bump, never for a
//! camera read or an encode.

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

/// Most recently published JPEG and its sequence number
#[derive(Debug, Clone)]
pub struct LatestFrame {
    pub jpeg: Bytes,
    /// 1 for the first published frame, increasing by one per publish
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct FrameStore {
    slot: Mutex<Option<LatestFrame>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame. Returns the sequence number assigned to it.
    pub fn publish(&self, jpeg: Bytes) -> u64 {
        let mut slot = self.slot.lock();
        let sequence = slot.as_ref().map_or(1, |f| f.sequence + 1);
        debug!(sequence, bytes = jpeg.len(), "Frame published");
        *slot = Some(LatestFrame { jpeg, sequence });
        sequence
    }

    /// Current frame, or `None` until the first successful capture.
    pub fn read(&self) -> Option<LatestFrame> {
        self.slot.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_before_first_publish() {
        let store = FrameStore::new();
        assert!(store.read().is_none());
        assert!(!store.is_ready());
    }

    #[test]
    fn test_read_returns_most_recent() {
        let store = FrameStore::new();
        for i in 0..5u8 {
            store.publish(Bytes::from(vec![i; 4]));
        }

        let latest = store.read().unwrap();
        assert_eq!(latest.sequence, 5);
        assert_eq!(&latest.jpeg[..], &[4, 4, 4, 4]);
    }

    #[test]
    fn test_readers_never_see_torn_or_older_frames() {
        let store = Arc::new(FrameStore::new());

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 1..=500u32 {
                    store.publish(Bytes::from(vec![(i % 251) as u8; 256]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let mut last_seq = 0;
                    for _ in 0..500 {
                        if let Some(frame) = store.read() {
                            assert!(frame.sequence >= last_seq, "sequence went backwards");
                            last_seq = frame.sequence;
                            let first = frame.jpeg[0];
                            assert!(frame.jpeg.iter().all(|b| *b == first), "torn frame");
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.read().unwrap().sequence, 500);
    }
}
