//! Sink implementations
//!
//! FileSink (files and standard streams), SyslogSink and TokenTcpSink.

mod file;
pub mod link;
mod syslog;
mod token_tcp;

pub use self::file::FileSink;
pub use self::link::{Dial, Link, LinkState};
pub use self::syslog::{SyslogConn, SyslogDialer, SyslogFormatter, SyslogSink, SyslogTarget};
pub use self::token_tcp::{TokenConn, TokenTcpDialer, TokenTcpSink};
