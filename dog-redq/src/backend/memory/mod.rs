pub mod storage;

#[cfg(test)]
pub(crate) mod failing;

pub use storage::MemoryBackend;
