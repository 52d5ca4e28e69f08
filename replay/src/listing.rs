use common::{BlobResult, BlobStore, SegmentLayout};

/// Lists the archived segments of `topic` that sort strictly after `after`,
/// in ascending key order.
///
/// Keys under the layout's prefix without the layout's suffix are ignored.
pub async fn pending_segments(
    store: &dyn BlobStore,
    layout: SegmentLayout,
    topic: &str,
    after: &str,
) -> BlobResult<Vec<String>> {
    let mut keys: Vec<String> = store
        .list(&layout.prefix(topic))
        .await?
        .into_iter()
        .filter(|key| layout.matches(topic, key) && key.as_str() > after)
        .collect();
    keys.sort();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use common::ObjectBlobStore;

    use super::*;

    async fn store_with(keys: &[&str]) -> ObjectBlobStore {
        let store = ObjectBlobStore::in_memory();
        for key in keys {
            store.put(key, Bytes::from("x")).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn should_list_all_segments_in_order_for_empty_cursor() {
        // given
        let store = store_with(&[
            "orders/2024-01-02/orders_1704153600.dat",
            "orders/2024-01-01/orders_1704067200.dat",
            "orders/2024-01-01/orders_1704067300.dat",
        ])
        .await;

        // when
        let keys = pending_segments(&store, SegmentLayout::Dated, "orders", "")
            .await
            .unwrap();

        // then
        assert_eq!(
            keys,
            vec![
                "orders/2024-01-01/orders_1704067200.dat",
                "orders/2024-01-01/orders_1704067300.dat",
                "orders/2024-01-02/orders_1704153600.dat",
            ]
        );
    }

    #[tokio::test]
    async fn should_only_list_segments_after_cursor() {
        // given
        let store = store_with(&[
            "orders/2024-01-01/orders_1704067200.dat",
            "orders/2024-01-01/orders_1704067300.dat",
        ])
        .await;

        // when
        let keys = pending_segments(
            &store,
            SegmentLayout::Dated,
            "orders",
            "orders/2024-01-01/orders_1704067200.dat",
        )
        .await
        .unwrap();

        // then
        assert_eq!(keys, vec!["orders/2024-01-01/orders_1704067300.dat"]);
    }

    #[tokio::test]
    async fn should_ignore_other_topics_and_foreign_files() {
        // given
        let store = store_with(&[
            "orders/2024-01-01/orders_1.dat",
            "orders/notes.txt",
            "orders2/2024-01-01/orders2_1.dat",
            "rayflux/orders/2024-01-01T00-00-00.000Z.jsonl",
        ])
        .await;

        // when
        let dated = pending_segments(&store, SegmentLayout::Dated, "orders", "")
            .await
            .unwrap();
        let jsonl = pending_segments(&store, SegmentLayout::Jsonl, "orders", "")
            .await
            .unwrap();

        // then
        assert_eq!(dated, vec!["orders/2024-01-01/orders_1.dat"]);
        assert_eq!(jsonl, vec!["rayflux/orders/2024-01-01T00-00-00.000Z.jsonl"]);
    }
}
