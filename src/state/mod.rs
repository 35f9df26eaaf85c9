//! Page-level state machine

mod page_state;
mod prejoin;

pub use page_state::{PageEvent, PageState};
pub use prejoin::PreJoinPage;
