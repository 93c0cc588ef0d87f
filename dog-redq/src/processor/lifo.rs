use super::Processor;
use crate::backend::End;

/// Last-in-first-out: push and pull at the left
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl Processor for Lifo {
    fn name(&self) -> &'static str {
        "lifo"
    }

    fn push_end(&self) -> End {
        End::Left
    }

    fn pull_end(&self) -> End {
        End::Left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{memory::MemoryBackend, ListBackend};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lifo_pulls_newest_first() {
        let backend = MemoryBackend::new();
        Lifo.push(&backend, "stack", b"old").await.unwrap();
        Lifo.push(&backend, "stack", b"new").await.unwrap();

        let top = Lifo.pull(&backend, "stack", Duration::from_millis(20)).await.unwrap();

        assert_eq!(top, Some(b"new".to_vec()));
        assert_eq!(backend.length("stack").await.unwrap(), 1);
    }
}
