// the final storage: a concurrent string->string map. only the delivery
// loops write to it; client reads (point reads only, per the non-goals) may
// race a concurrent delivery, which is fine -- no read-consistency guarantee
// beyond "see whatever has been delivered so far" is promised.

use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Store(Arc<scc::HashMap<String, String>>);

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: String, value: String) {
        self.0.upsert_async(key, value).await;
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.0.read_async(key, |_, value| value.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = Store::new();
        assert_eq!(store.get("x").await, None);
        store.put("x".into(), "1".into()).await;
        assert_eq!(store.get("x").await, Some("1".into()));
        store.put("x".into(), "2".into()).await;
        assert_eq!(store.get("x").await, Some("2".into()));
    }
}
