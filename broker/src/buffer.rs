//! Double-buffered in-memory queue of recent payloads.

use bytes::Bytes;

/// Two payload buffers, one active and one standby.
///
/// Writes only go to the active buffer. A rotation clears the standby buffer
/// and makes it active, so the previous active buffer stays readable as the
/// standby until the next rotation.
#[derive(Debug)]
pub(crate) struct BufferPair {
    buffers: [Vec<Bytes>; 2],
    sizes: [u64; 2],
    active: usize,
    threshold: u64,
}

impl BufferPair {
    pub(crate) fn new(threshold: u64) -> Self {
        Self {
            buffers: [Vec::new(), Vec::new()],
            sizes: [0, 0],
            active: 0,
            threshold,
        }
    }

    /// Appends a payload to the active buffer. Returns true if the buffer
    /// reached the threshold and was rotated.
    pub(crate) fn push(&mut self, payload: Bytes) -> bool {
        self.sizes[self.active] += payload.len() as u64;
        self.buffers[self.active].push(payload);
        if self.sizes[self.active] >= self.threshold {
            self.rotate();
            return true;
        }
        false
    }

    /// Clears the standby buffer and flips the active index.
    pub(crate) fn rotate(&mut self) {
        let standby = 1 - self.active;
        self.buffers[standby].clear();
        self.sizes[standby] = 0;
        self.active = standby;
    }

    pub(crate) fn active_index(&self) -> usize {
        self.active
    }

    pub(crate) fn active(&self) -> &[Bytes] {
        &self.buffers[self.active]
    }

    pub(crate) fn active_bytes(&self) -> u64 {
        self.sizes[self.active]
    }

    pub(crate) fn standby_bytes(&self) -> u64 {
        self.sizes[1 - self.active]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_append_to_active_buffer() {
        // given
        let mut buffers = BufferPair::new(1024);

        // when
        let rotated = buffers.push(Bytes::from("m1"));

        // then
        assert!(!rotated);
        assert_eq!(buffers.active(), &[Bytes::from("m1")]);
        assert_eq!(buffers.active_bytes(), 2);
        assert_eq!(buffers.standby_bytes(), 0);
    }

    #[test]
    fn should_rotate_when_threshold_reached() {
        // given
        let mut buffers = BufferPair::new(4);
        buffers.push(Bytes::from("ab"));

        // when
        let rotated = buffers.push(Bytes::from("cd"));

        // then: new active buffer is empty, previous content is standby
        assert!(rotated);
        assert_eq!(buffers.active_index(), 1);
        assert!(buffers.active().is_empty());
        assert_eq!(buffers.active_bytes(), 0);
        assert_eq!(buffers.standby_bytes(), 4);
    }

    #[test]
    fn should_clear_standby_on_rotation() {
        // given: content in both buffers
        let mut buffers = BufferPair::new(1024);
        buffers.push(Bytes::from("old"));
        buffers.rotate();
        buffers.push(Bytes::from("new"));

        // when
        buffers.rotate();

        // then: "old" was discarded, "new" is the standby
        assert_eq!(buffers.active_index(), 0);
        assert!(buffers.active().is_empty());
        assert_eq!(buffers.standby_bytes(), 3);
    }

    #[test]
    fn should_keep_one_buffer_empty_after_every_rotation() {
        // given
        let mut buffers = BufferPair::new(10);

        for i in 0..100 {
            // when
            let rotated = buffers.push(Bytes::from(format!("payload-{}", i)));

            // then
            if rotated {
                assert_eq!(buffers.active_bytes(), 0);
                assert!(buffers.standby_bytes() >= 10);
            }
            assert!(buffers.active_bytes() < 10);
        }
    }
}
