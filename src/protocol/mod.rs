//! CVS client/server protocol vocabulary.
//!
//! # Wire format
//!
//! Both directions are line oriented. Requests are `Name [args]\n`, some
//! followed by further lines or a `<size>\n<bytes>` file body. Responses
//! start with a name token terminated by a space or newline.
//!
//! ```text
//! C: Root /cvsroot
//! C: Valid-responses ok error M E ...
//! C: valid-requests
//! S: Valid-requests Root Valid-responses valid-requests Directory ...
//! S: ok
//! C: version
//! S: M Concurrent Versions System (CVS) 1.12.13 (client/server)
//! S: ok
//! ```

pub mod parser;
pub mod request;
pub mod response;

pub use parser::{parse_mod_time, DefaultResponseParser, ResponseParser};
pub use request::{Command, FilePayload, GlobalOptions, Request, Requests, TransmitKind};
pub use response::{
    EntryPath, EntryUpdate, FileUpdate, MessageCollector, ResponseHandler, ResponseKind,
};
