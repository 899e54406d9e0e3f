//! Error handling for usersync.
//!
//! - **Error Categories**: coarse classification for handling decisions
//! - **Network Errors**: transport failures and non-2xx responses, with the
//!   server's status and body preserved
//! - **Run Errors**: `SyncError`, for failures that stop a run or a call
//!
//! | Category | Description |
//! |----------|-------------|
//! | Network | Connection, timeout |
//! | Auth | 401/403 |
//! | Server | 5xx, 408, 429 |
//! | Client | Other 4xx |
//! | User | Invalid input, refused start |
//! | Configuration | Missing settings |

mod category;
mod network;
mod sync_error;

pub use category::ErrorCategory;
pub use network::{classify_reqwest_error, NetworkError};
pub use sync_error::SyncError;

/// Type alias for Results using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;
