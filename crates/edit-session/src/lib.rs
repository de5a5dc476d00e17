//! Edit session store
//!
//! Holds the live graph during interactive editing. Every structural change
//! goes through an [`EditSession`] operation so it is guarded by a snapshot
//! on the undo stack.

mod errors;
mod history;
mod session;
mod shared;

pub use errors::SessionError;
pub use history::{History, MAX_HISTORY};
pub use session::EditSession;
pub use shared::SharedEditSession;
