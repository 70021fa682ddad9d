// Concrete implementations of the domain ports: real serial devices, a TCP correction feed and
// a passthrough producer.

pub mod passthrough;
pub mod tcp_feed;
pub mod tty;

pub use passthrough::PassthroughProducer;
pub use tcp_feed::{TcpFeedClient, TcpFeedConnector};
pub use tty::TtyBackend;
