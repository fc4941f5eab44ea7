//! Lock Module
//!
//! Single-owner, non-blocking mutual exclusion per primary key.
//!
//! ## Semantics
//! - `acquire` succeeds only when nobody holds the key; otherwise it fails
//!   immediately (no queue, no timeout, no deadlock detection)
//! - Not reentrant: the owner itself cannot acquire the key twice
//! - No read/write modes; isolation beyond a single read-modify-write
//!   sequence must be layered on top
//!
//! Mutating table operations take the key through `try_lock`, whose guard
//! releases the key on every exit path.

mod table;

pub use table::{KeyLockGuard, LockTable, OwnerId};
