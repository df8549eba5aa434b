//! Repository contract for the Chasm content-addressed object store.
//!
//! The [`Repository`] trait is the sole surface a storage backend implements.
//! It splits into a small set of backend primitives (object read/write, ref
//! read/CAS-write/list) and a default-methods layer deriving everything else:
//! tree and commit operations through the configured codec, and batch
//! operations fanning out to the single-entity primitives with bounded
//! parallelism. Backends override a derived method only when they can do
//! better.
//!
//! # Concurrency
//!
//! There is no global lock. Correctness rests on two properties backends must
//! provide:
//!
//! - per-address idempotence — concurrent writers of the same content both
//!   succeed, and exactly one observes `created: true`;
//! - per-ref linearizability — branch advancement is a compare-and-swap, and
//!   the storage layer's atomic primitive defines the total order.
//!
//! Every operation takes a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! and surfaces [`ChasmError::Cancelled`] when it fires at a suspension point.

pub mod cas;
pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

pub use cas::{decide_ref_update, require_non_blank, validate_ref_write, RefUpdate};
pub use config::RepoConfig;
pub use error::{ChasmError, ChasmResult};
pub use memory::MemoryRepository;
pub use traits::{PayloadProducer, Repository};
