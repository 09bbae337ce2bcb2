//! Session affinity.
//!
//! # Data Flow
//! ```text
//! Request
//!     → cookie/header token extracted
//!     → resolver table lookup (canonical, then legacy encodings)
//!     → hit: pinned server (+ rewrite signal if a legacy form matched)
//!     → miss: not an error — balancer falls through to its strategy
//!
//! Response (new affinity or legacy rewrite):
//!     → canonical token written as Set-Cookie / header
//! ```
//!
//! # Design Decisions
//! - Canonical token is a SHA-256 hex digest of the server name; legacy
//!   weak and double-hashed encodings stay accepted so old clients keep
//!   their pinning, and any legacy match self-heals to the canonical form
//! - The table is built per balancer from its handler set; lookups are
//!   read-locked on the request path, writes happen only on `add`

pub mod cookie;
pub mod hashing;
pub mod resolver;

pub use resolver::{StickyHit, StickyResolver};
