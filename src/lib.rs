pub mod batch;
pub mod codec;
pub mod frame;
pub mod session;
pub mod transport;
pub mod window;

pub use batch::RelpBatch;
pub use codec::{ParseError, ParsePosition, ResponseCodeError};
pub use frame::Frame;
pub use session::{AckError, ConnectError, RelpError, RelpSession, SessionBuilder, SessionOptions};
pub use transport::{Dialer, PlainDialer, TlsClientConfig, TlsDialer, Transport, TransportError};
pub use window::TransactionWindow;

/// A specialized `Result` type for RELP session operations.
pub type Result<T> = std::result::Result<T, RelpError>;
