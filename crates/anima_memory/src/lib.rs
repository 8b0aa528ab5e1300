//! # Anima Memory
//!
//! Three stores with very different lifetimes:
//!
//! - [`MemoryArchive`]: in-process FIFO of the last few activation snapshots.
//! - [`KnowledgeStore`]: concepts extracted from dialogue, persisted as one
//!   JSON document rewritten on every update.
//! - [`MemoryJournal`]: append-only text log of exchanges, whose tail feeds
//!   the delayed re-analysis.
//!
//! Writes are best-effort. Failures come back as
//! [`anima_core::StorageError`] for the caller to log; in-memory state is
//! never rolled back.

pub mod archive;
pub mod journal;
pub mod knowledge;

pub use archive::{MemoryArchive, MemoryEntry};
pub use journal::{JournalRecord, MemoryJournal};
pub use knowledge::{ConceptDraft, ConceptKind, ConceptNode, KnowledgeStore};
