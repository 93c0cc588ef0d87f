use super::Processor;
use crate::backend::End;

/// First-in-first-out: push left, pull right
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl Processor for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn push_end(&self) -> End {
        End::Left
    }

    fn pull_end(&self) -> End {
        End::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_fifo_pulls_in_push_order() {
        let backend = MemoryBackend::new();
        for item in ["first", "second", "third"] {
            Fifo.push(&backend, "queue", item.as_bytes()).await.unwrap();
        }

        let mut pulled = Vec::new();
        while let Some(item) = Fifo.pull(&backend, "queue", WAIT).await.unwrap() {
            pulled.push(item);
        }

        assert_eq!(pulled, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[tokio::test]
    async fn test_requeue_all_keeps_delivery_order() {
        let backend = MemoryBackend::new();
        for item in [b"a", b"b", b"c"] {
            Fifo.push(&backend, "queue", item).await.unwrap();
        }
        for _ in 0..3 {
            Fifo.pull_to(&backend, "queue", "parked", WAIT).await.unwrap();
        }

        let moved = Fifo.requeue_all(&backend, "parked", "queue").await.unwrap();
        assert_eq!(moved, 3);

        let mut pulled = Vec::new();
        while let Some(item) = Fifo.pull(&backend, "queue", WAIT).await.unwrap() {
            pulled.push(item);
        }
        assert_eq!(pulled, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}
