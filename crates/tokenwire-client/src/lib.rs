//! Credit-based, multi-filter streaming client.
//!
//! A [`Session`] multiplexes any number of producers (one per filter) and a
//! single consumer over one connection. The server grants each filter a
//! number of credits in its handshake and hands one back per processed
//! frame; a producer may only send while its filter holds credit.
//!
//! ```text
//! Producer(A) ─┐                         ┌─► Consumer
//! Producer(B) ─┼─► credit ─► sink ═══ server ═══ stream ─┤
//! Producer(C) ─┘     ▲                                   └─► release(filter)
//!                    └───────────── TokenRegistry ◄──────────┘
//! ```
//!
//! There is no timeout on credit: if the server never returns credit for a
//! filter, that filter's producer waits for as long as the session lives.
//! The server is the only authority on pacing.

pub mod capability;
pub mod consumer;
pub mod error;
pub mod handshake;
pub mod producer;
pub mod registry;
pub mod session;
pub mod timing;

pub use capability::{Consumer, InputFrame, Producer};
pub use error::{ClientError, Result};
pub use handshake::HandshakeSummary;
pub use registry::{Release, TokenRegistry};
pub use session::{SequenceCounter, Session, SessionConfig, SessionEnd, StopHandle};
pub use timing::{TimingConsumer, TimingProducer, TimingStats};
