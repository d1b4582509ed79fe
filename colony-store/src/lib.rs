//! Key-value persistence for tasks and agents.
//!
//! The [`Kv`] trait is the seam: production binds [`RedisKv`], tests bind
//! [`MemoryKv`]. [`TaskStore`] and [`AgentStore`] are thin typed layers on
//! top of it; every write refreshes a 12-hour TTL, so abandoned state ages
//! out on its own.

mod agent;
mod error;
mod kv;
mod task;

pub use agent::{AgentRecord, AgentStore};
pub use error::StoreError;
pub use kv::{Kv, MemoryKv, RedisKv};
pub use task::{TaskRecord, TaskStatus, TaskStore};

use std::time::Duration;

/// TTL applied to every task and agent row.
pub const ROW_TTL: Duration = Duration::from_secs(12 * 60 * 60);
