//! CLI command handlers, one per file.

mod cancel;
mod follow;
mod resume;
mod status;
mod submit;
mod watch;

pub use cancel::run_cancel;
pub use resume::run_resume;
pub use status::run_status;
pub use submit::run_submit;
pub use watch::run_watch;
