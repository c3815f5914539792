//! Abstract capability interfaces for the byte transport and the
//! optional HDLC-like framer (spec §6). Both are external collaborators;
//! this crate only depends on these trait boundaries, never a concrete
//! serial port or socket type.

use std::io;

/// Opaque identifier for a transport instance, threaded through to
/// [`crate::prefix::PrefixEvent`] so a multi-NCP host can tell which
/// link an on-mesh-nets update came from. This crate never interprets
/// the value; callers assign it at construction.
pub type TransportHandle = u64;

/// A blocking byte transport: a serial port or socket, specified only by
/// interface (spec §1).
pub trait Transport: Send {
    /// Blocking read of up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Blocking write of the entire buffer.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Returns an independent handle to the same underlying transport,
    /// so the reader thread and the transaction mux's writer can operate
    /// without contending on a single lock (mirroring `TcpStream::try_clone`).
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;
}

/// The external HDLC-like framer: byte-stuffing, flag bytes, and FCS,
/// treated as a black box (spec §1). When absent, the reader assumes the
/// transport delivers one Spinel packet per `read` call.
pub trait Framer: Send {
    /// Wraps an already-encoded Spinel frame for transmission.
    fn encode(&mut self, frame: &[u8]) -> Vec<u8>;

    /// Blocks on `transport` until a complete frame has been
    /// destuffed and its FCS validated, returning the inner Spinel frame.
    fn collect(&mut self, transport: &mut dyn Transport) -> io::Result<Vec<u8>>;
}
