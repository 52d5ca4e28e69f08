//! Local append-only segment files and their upload to the blob store.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use common::BlobStore;
use common::keys::{dated_segment_key, segment_file_name};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Returns the id of the next segment of a topic.
///
/// Ids are creation times in Unix seconds, bumped past the previous id so
/// that two segments sealed within the same second still get increasing keys.
pub(crate) fn next_segment_id(now_secs: u64, last_id: Option<u64>) -> u64 {
    match last_id {
        Some(last) => now_secs.max(last + 1),
        None => now_secs,
    }
}

/// The segment file currently receiving writes for a topic.
pub(crate) struct OpenSegment {
    topic: String,
    id: u64,
    created_at: SystemTime,
    path: PathBuf,
    file: tokio::fs::File,
    size: u64,
}

impl OpenSegment {
    /// Creates a new segment file in `dir`.
    ///
    /// If a file with the requested id is left over from an earlier run the
    /// id is bumped until a free one is found.
    pub(crate) async fn create(
        dir: &Path,
        topic: &str,
        mut id: u64,
        created_at: SystemTime,
    ) -> Result<Self> {
        loop {
            let path = dir.join(segment_file_name(topic, id));
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(file) => {
                    tracing::debug!(topic, segment_id = id, "opened segment file {:?}", path);
                    return Ok(Self {
                        topic: topic.to_string(),
                        id,
                        created_at,
                        path,
                        file,
                        size: 0,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => id += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Appends `payload` followed by a newline.
    pub(crate) async fn append(&mut self, payload: &[u8]) -> Result<()> {
        self.file.write_all(payload).await?;
        self.file.write_all(b"\n").await?;
        self.size += payload.len() as u64 + 1;
        Ok(())
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }

    /// Returns true if the segment reached the size threshold, or reached
    /// the age threshold while holding data.
    pub(crate) fn is_due(&self, now: SystemTime, max_bytes: u64, max_age: Duration) -> bool {
        self.size > 0 && (self.size >= max_bytes || self.age(now) >= max_age)
    }

    /// Flushes and closes the file.
    pub(crate) async fn close(mut self) -> Result<SealedSegment> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(SealedSegment {
            key: dated_segment_key(&self.topic, self.id),
            topic: self.topic,
            path: self.path,
            size: self.size,
        })
    }
}

/// A closed segment file waiting to be archived.
#[derive(Debug)]
pub(crate) struct SealedSegment {
    pub(crate) topic: String,
    pub(crate) key: String,
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
}

impl SealedSegment {
    /// Uploads the file under its archive key and removes it locally.
    ///
    /// On failure the local file is left in place.
    pub(crate) async fn upload(&self, store: &dyn BlobStore) -> Result<()> {
        let content = tokio::fs::read(&self.path).await?;
        store.put(&self.key, Bytes::from(content)).await?;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(
                topic = %self.topic,
                "uploaded segment {} but failed to remove {:?}: {}",
                self.key,
                self.path,
                e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::UNIX_EPOCH;

    use common::ObjectBlobStore;

    use super::*;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn should_allocate_strictly_increasing_ids() {
        assert_eq!(next_segment_id(1000, None), 1000);
        assert_eq!(next_segment_id(1000, Some(999)), 1000);
        assert_eq!(next_segment_id(1000, Some(1000)), 1001);
        assert_eq!(next_segment_id(900, Some(1000)), 1001);
    }

    #[tokio::test]
    async fn should_append_lines_and_track_size() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut segment = OpenSegment::create(dir.path(), "orders", 1000, at(1000))
            .await
            .unwrap();

        // when
        segment.append(b"m1").await.unwrap();
        segment.append(b"m22").await.unwrap();
        let sealed = segment.close().await.unwrap();

        // then
        assert_eq!(sealed.size, 7);
        assert_eq!(sealed.key, "orders/1970-01-01/orders_1000.dat");
        let content = std::fs::read(&sealed.path).unwrap();
        assert_eq!(content, b"m1\nm22\n");
    }

    #[tokio::test]
    async fn should_bump_id_when_file_exists() {
        // given
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("orders_1000.dat"), b"left over\n").unwrap();

        // when
        let segment = OpenSegment::create(dir.path(), "orders", 1000, at(1000))
            .await
            .unwrap();

        // then
        assert_eq!(segment.id(), 1001);
    }

    #[tokio::test]
    async fn should_only_be_due_when_non_empty() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut segment = OpenSegment::create(dir.path(), "orders", 1000, at(1000))
            .await
            .unwrap();
        let max_age = Duration::from_secs(600);

        // then: old but empty
        assert!(!segment.is_due(at(5000), 100, max_age));

        // when
        segment.append(b"m1").await.unwrap();

        // then
        assert!(!segment.is_due(at(1001), 100, max_age));
        assert!(segment.is_due(at(1600), 100, max_age));
        assert!(segment.is_due(at(1001), 3, max_age));
    }

    #[tokio::test]
    async fn should_upload_and_remove_local_file() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectBlobStore::in_memory());
        let mut segment = OpenSegment::create(dir.path(), "orders", 1_704_067_200, at(0))
            .await
            .unwrap();
        segment.append(b"m1").await.unwrap();
        let sealed = segment.close().await.unwrap();

        // when
        sealed.upload(store.as_ref()).await.unwrap();

        // then
        let archived = store
            .get("orders/2024-01-01/orders_1704067200.dat")
            .await
            .unwrap();
        assert_eq!(archived, Some(Bytes::from("m1\n")));
        assert!(!sealed.path.exists());
    }
}
