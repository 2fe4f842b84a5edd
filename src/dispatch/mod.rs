//! Map file dispatch
//!
//! Once a request leaves the quarantine it is handed to a [`FileDispatcher`],
//! which performs the actual transfer. The orchestrator runs each dispatch in
//! its own task and reports the outcome as an event.
//!
//! - [`HttpFileDispatcher`]: streams the file to disk, falling back across mirrors

mod http;
mod traits;

pub use http::HttpFileDispatcher;
pub use traits::FileDispatcher;
