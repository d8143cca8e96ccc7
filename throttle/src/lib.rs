//! Bandwidth limiting and transfer concurrency control for prsync
//!
//! This crate provides the throttling primitives used by the copy engine and the transfer
//! orchestrator.
//!
//! # Overview
//!
//! Two kinds of throttling are provided:
//!
//! 1. **Bandwidth limit** - [`RateLimiter`] caps the number of bytes one transfer may move per
//!    second. It also drives the read-buffer size of the caller: every read asks the limiter how
//!    many bytes are still allowed in the current one-second window.
//! 2. **Transfer slots** - [`TransferSlots`] caps how many transfers run at the same time.
//!
//! # Usage Patterns
//!
//! ## Bandwidth Limit
//!
//! ```rust,no_run
//! use throttle::RateLimiter;
//!
//! # async fn example(mut read_chunk: impl FnMut(u64) -> u64) {
//! // 64 KB/s
//! let mut limiter = RateLimiter::new(64);
//! loop {
//!     let read = read_chunk(limiter.chunk_size());
//!     if read == 0 {
//!         break;
//!     }
//!     // sleeps until the end of the current window once the budget is used up
//!     limiter.consume(read).await;
//! }
//! # }
//! ```
//!
//! ## Transfer Slots
//!
//! ```rust,no_run
//! use throttle::TransferSlots;
//!
//! # async fn example() {
//! let slots = TransferSlots::new(10);
//! let _permit = slots.acquire().await;
//! // run one transfer here - the slot is released when the permit is dropped
//! # }
//! ```
//!
//! # Window Accounting
//!
//! A limiter configured with `B` KB/s owns a budget of `B * 1024` bytes per window. Chunks smaller
//! than the remaining budget are subtracted from it. The chunk that exhausts the budget ends the
//! window: if less than a second has passed since the window started, the calling task sleeps for
//! the rest of that second, then a fresh window starts with a full budget.
//!
//! Time is measured with [`tokio::time::Instant`], so a paused tokio clock drives the limiter in
//! tests.
//!
//! # Thread Safety
//!
//! A [`RateLimiter`] is owned by exactly one transfer and is used through `&mut self`; it does no
//! internal locking. [`TransferSlots`] is cheap to clone and shared between all workers.

mod bandwidth;
mod semaphore;

pub use bandwidth::{KB_TO_BYTES, RateLimiter, UNLIMITED_CHUNK_SIZE};
pub use semaphore::TransferSlots;
