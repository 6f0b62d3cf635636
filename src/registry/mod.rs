//! Connection registry and message buffering
//!
//! The registry maps external serverIds to registrations and routes upstream
//! chat into per-registration buffers drained by the poll path.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<Registry>
//!                ┌────────────────────────────┐
//!                │ entries: HashMap<ServerId, │
//!                │   Registration {           │
//!                │     links: gate-guarded,   │
//!                │     buffer,                │
//!                │   }                        │
//!                │ >                          │
//!                └─────────────┬──────────────┘
//!                              │
//!            ┌─────────────────┼─────────────────┐
//!            │                 │                 │
//!            ▼                 ▼                 ▼
//!      [reader task]     [register/remove]    [poll]
//!      next_signal()     gate.lock()          buffer.drain()
//!            │
//!            └──► buffer.append() ──► drained by next poll ──► JSON
//! ```
//!
//! # Locking
//!
//! The entries map is behind an `RwLock` held only for point lookups and
//! inserts/removals. Lifecycle operations (create, override, remove) for one
//! serverId serialize on that registration's own gate; the connect retry
//! loop runs under the gate so concurrent registers for one key can never
//! race, while other keys and all polls proceed untouched. Buffers have
//! their own internal lock, so appends and drains never wait on lifecycle
//! operations.

pub mod buffer;
pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod store;

pub use buffer::MessageBuffer;
pub use config::RegistryConfig;
pub use entry::{LinkInfo, LinkState, Registration};
pub use error::RegistryError;
pub use event::{ChatEvent, Platform, UnknownPlatform};
pub use store::{RegisterOutcome, Registry};
