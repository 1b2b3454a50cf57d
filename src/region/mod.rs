//! Region Module
//!
//! The put path and the region it runs against.
//!
//! - [`request`]: `PutRequest` and its admission flags
//! - [`put`]: `PutOperation`, the admission protocol itself
//! - [`event`]: `EntryEvent`, which applies values to slots and captures old values
//! - [`context`]: the commit hooks a region provides, plus the clock
//! - [`lock`]: the shared/exclusive modification lock held during commit
//! - [`codec`]: value serialization ahead of placement
//! - [`local`]: `LocalRegion`, which wires all of the above together
//!
//! See [`put`] for the admission rules.

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod local;
pub mod lock;
pub mod put;
pub mod request;
pub mod stats;

// Re-export commonly used types
pub use codec::{IdentityCodec, SizeLimitedCodec, ValueCodec};
pub use config::{RegionConfig, DEFAULT_MAX_VALUE_SIZE, DEFAULT_RETRY_WARN_THRESHOLD};
pub use context::{Clock, PutCommit, RegionCallback, RegionContext, SystemClock};
pub use error::{CodecError, PutError, PutResult};
pub use event::{AdmissionPath, EntryEvent, EventRecord};
pub use local::{CacheListener, LocalRegion};
pub use lock::{CacheModificationLock, ExclusiveGuard, ModificationGuard, RegionModificationLock};
pub use put::{PutOperation, PutOutcome};
pub use request::{Operation, PutRequest};
pub use stats::{CachePerfStats, PerfStats};
