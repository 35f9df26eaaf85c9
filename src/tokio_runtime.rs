//! Tokio runtime for the prejoin demo
//!
//! The page and its level monitor share a single thread: the sampling loop
//! only advances while the page is awaiting something. Capture backends
//! that need their own threads (PipeWire) start them themselves.

use tokio::runtime::{Builder, Runtime};

/// Build the runtime the page runs on
pub fn build() -> std::io::Result<Runtime> {
    Builder::new_current_thread()
        .thread_name("prejoin")
        .enable_all()
        .build()
}
