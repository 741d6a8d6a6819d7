//! Client sessions: negotiation, request transmission and response dispatch.

pub mod control;
pub mod environment;
pub mod error_defending;
pub mod processor;
pub mod valid_requests;

pub use control::{AbortFlag, AbortSource, NeverAbort, NoProgress, Platform, ProgressHandler};
pub use environment::ClientEnvironment;
pub use error_defending::{ErrorDefendingResponseHandler, MAX_CONSECUTIVE_ERRORS};
pub use processor::RequestProcessor;
pub use valid_requests::{ValidRequests, ValidRequestsCollector};
