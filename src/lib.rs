//! `spinel-core`: a host-side driver core for the Spinel control
//! protocol, the binary framing protocol used between a host processor
//! and a Network Co-Processor (NCP) running an IEEE 802.15.4 / Thread
//! radio stack.
//!
//! This crate provides the three concerns that make Spinel hard to get
//! right on the host side:
//!
//! - [`format`] and [`codec`]: a type-directed codec over the Spinel
//!   type-language grammar (`b`, `C`/`c`, `S`/`s`, `L`/`l`, `X`, `i`,
//!   `6`, `E`/`e`, `U`, `D`/`d`, `t(...)`, `A(...)`).
//! - [`packet`]: the `Header | Command | Payload` frame layer.
//! - [`property`] and [`dispatcher`]: a registry mapping property
//!   identifiers to format descriptors, and the small state machine that
//!   recognizes `PROP_VALUE_IS`/`INSERTED`/`REMOVED`.
//! - [`transaction`]: a TID-multiplexed request/response engine with
//!   blocking waits, timeouts, and asynchronous per-property callbacks.
//! - [`prefix`]: a dedicated worker for `THREAD_ON_MESH_NETS` updates,
//!   kept off the reader thread.
//! - [`driver`]: wires the above into the three-thread model (reader,
//!   prefix handler, callers) that keeps request/response traffic and
//!   asynchronous updates flowing without blocking each other.
//!
//! The byte transport (serial port or socket) and the optional HDLC
//! framer are external collaborators, exposed here only as the
//! [`transport::Transport`] and [`transport::Framer`] trait boundaries.
//! The large enum of vendor-specific property and command identifiers is
//! likewise out of scope: [`constants`] carries only the small slice
//! this crate's own dispatch logic needs, and [`property::PropertyRegistry::merge`]
//! is the extension point for the rest.

pub mod codec;
pub mod constants;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod format;
pub mod packet;
pub mod prefix;
pub mod property;
pub mod transaction;
pub mod transport;
pub mod value;

pub use error::{SpinelError, SpinelResult};
pub use format::{Format, FormatDescriptor, FormatElem};
pub use value::Value;

pub use driver::Driver;
pub use property::{PropertyOutcome, PropertyRegistry};
pub use transaction::{MuxConfig, ResponseItem, TransactionMux};
pub use transport::{Framer, Transport, TransportHandle};
