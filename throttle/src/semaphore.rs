/// Caps the number of transfers running at the same time.
#[derive(Clone, Debug)]
pub struct TransferSlots {
    // None means no limit
    sem: Option<std::sync::Arc<tokio::sync::Semaphore>>,
}

impl TransferSlots {
    /// Creates `limit` slots, 0 means no limit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        if limit == 0 {
            return Self { sem: None };
        }
        let limit = std::cmp::min(limit, tokio::sync::Semaphore::MAX_PERMITS);
        Self {
            sem: Some(std::sync::Arc::new(tokio::sync::Semaphore::new(limit))),
        }
    }

    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.sem.as_ref().map(|sem| sem.available_permits())
    }

    /// Waits for a free slot; the slot is held until the returned permit is dropped.
    pub async fn acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        match &self.sem {
            // never closed
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_slots_never_wait() {
        let slots = TransferSlots::new(0);
        assert_eq!(slots.available(), None);
        let mut permits = vec![];
        for _ in 0..100 {
            permits.push(slots.acquire().await);
        }
        assert!(permits.iter().all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn limited_slots_wait_for_release() {
        let slots = TransferSlots::new(2);
        let first = slots.acquire().await;
        let _second = slots.acquire().await;
        assert_eq!(slots.available(), Some(0));
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(100), slots.acquire()).await;
        assert!(blocked.is_err());
        drop(first);
        let third =
            tokio::time::timeout(std::time::Duration::from_millis(100), slots.acquire()).await;
        assert!(matches!(third, Ok(Some(_))));
    }
}
