//! CLI command handlers. `serve` runs the daemon; the rest are socket clients.

mod cancel;
mod checksum;
mod clean;
mod delete;
mod fetch;
mod serve;
mod status;
mod submit;

pub use cancel::{run_cancel, run_cancel_group};
pub use checksum::run_checksum;
pub use clean::run_clean_storage;
pub use delete::{run_clear, run_delete, run_delete_group};
pub use fetch::run_fetch;
pub use serve::run_serve;
pub use status::{run_group, run_status};
pub use submit::run_submit;
