//! Ties the leaf components together into the three-thread model of
//! spec §5: a reader thread that owns the transport's receive side, a
//! `PrefixHandler` thread draining on-mesh-net updates, and the
//! `TransactionMux` shared with caller threads.
//!
//! Builder-free, explicit-struct construction throughout, matching the
//! rest of this crate's low-level protocol types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::dispatcher;
use crate::error::SpinelResult;
use crate::format::Format;
use crate::packet;
use crate::prefix::{PrefixEvent, PrefixHandler};
use crate::property::{DecodeContext, PropertyRegistry};
use crate::transaction::{MuxConfig, ResponseItem, TransactionMux};
use crate::transport::{Framer, Transport, TransportHandle};
use crate::value::Value;

/// Depth of the bounded channel feeding [`PrefixHandler`]. Sized so a
/// burst of `THREAD_ON_MESH_NETS` updates cannot make the reader thread
/// block (spec §4.6: "enqueues from the reader thread are non-blocking");
/// once full, the oldest-pending send is dropped and logged rather than
/// stalling the reader.
const PREFIX_QUEUE_DEPTH: usize = 8;

/// A running Spinel driver: owns the reader and prefix-handler threads
/// and exposes the [`TransactionMux`] operations callers issue requests
/// through.
pub struct Driver {
    mux: Arc<TransactionMux>,
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    prefix: Option<JoinHandle<()>>,
}

impl Driver {
    /// Spawns the reader and prefix-handler threads and returns a handle
    /// to the shared [`TransactionMux`].
    ///
    /// `transport` is consumed for the writer side; its `try_clone` is
    /// used to obtain the reader's independent receive handle. `tx_framer`
    /// and `rx_framer` are separate [`Framer`] instances (HDLC
    /// byte-stuffing state differs by direction); pass `None` for both to
    /// assume the transport already delivers one Spinel frame per `read`.
    pub fn spawn(
        transport: Box<dyn Transport>,
        tx_framer: Option<Box<dyn Framer>>,
        rx_framer: Option<Box<dyn Framer>>,
        registry: PropertyRegistry,
        config: MuxConfig,
        handle: TransportHandle,
    ) -> SpinelResult<Self> {
        let reader_transport = transport.try_clone()?;
        let alive = Arc::new(AtomicBool::new(true));
        let mux = Arc::new(TransactionMux::new(transport, tx_framer, config, Arc::clone(&alive)));

        let (prefix_tx, prefix_rx) = std::sync::mpsc::sync_channel(PREFIX_QUEUE_DEPTH);
        let prefix = std::thread::Builder::new()
            .name("spinel-prefix".into())
            .spawn(move || PrefixHandler::new().run(prefix_rx))?;

        let reader = {
            let mux = Arc::clone(&mux);
            let alive = Arc::clone(&alive);
            std::thread::Builder::new()
                .name("spinel-reader".into())
                .spawn(move || {
                    reader_loop(mux, reader_transport, rx_framer, registry, prefix_tx, alive, handle)
                })?
        };

        Ok(Driver {
            mux,
            alive,
            reader: Some(reader),
            prefix: Some(prefix),
        })
    }

    /// Reads a property, blocking for `timeout` (default 2s) for the
    /// matching `PROP_VALUE_IS`.
    pub fn prop_get(
        &self,
        prop_id: u32,
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.mux.prop_get(prop_id, tid, timeout)
    }

    /// Sets a property, blocking for the matching `PROP_VALUE_IS`.
    pub fn prop_set(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.mux.prop_set(prop_id, fmt, values, tid, timeout)
    }

    /// Inserts into a list-valued property, blocking for the matching
    /// `PROP_VALUE_INSERTED`.
    pub fn prop_insert(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.mux.prop_insert(prop_id, fmt, values, tid, timeout)
    }

    /// Removes from a list-valued property, blocking for the matching
    /// `PROP_VALUE_REMOVED`.
    pub fn prop_remove(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.mux.prop_remove(prop_id, fmt, values, tid, timeout)
    }

    /// Subscribes an asynchronous callback to every update of `prop_id`.
    pub fn callback_register<F>(&self, prop_id: u32, cb: F) -> SpinelResult<()>
    where
        F: Fn(&ResponseItem) -> bool + Send + Sync + 'static,
    {
        self.mux.callback_register(prop_id, cb)
    }

    /// Issues a reset and awaits `LAST_STATUS == STATUS_RESET_SOFTWARE`.
    pub fn reset(&self) -> SpinelResult<bool> {
        self.mux.reset()
    }

    /// Returns a reference to the underlying [`TransactionMux`] for
    /// callers that need direct access (e.g. `queue_register` ahead of a
    /// custom command not covered by the `prop_*` helpers).
    pub fn mux(&self) -> &TransactionMux {
        &self.mux
    }

    /// Clears the alive flag so the reader thread exits at its next
    /// read/shutdown check, then joins both background threads. Waiters
    /// blocked in `wait_for_prop` still resolve via their own timeout.
    pub fn shutdown(mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if let Some(prefix) = self.prefix.take() {
            let _ = prefix.join();
        }
    }
}

/// The reader thread body (spec §5.1): loops on the transport (via the
/// optional RX framer's `collect`, or a raw `read` when HDLC is
/// disabled), dispatches inbound packets, and feeds the mux. Never
/// blocks on consumer side; parsing errors are logged and the loop
/// continues rather than propagating (spec §7).
fn reader_loop(
    mux: Arc<TransactionMux>,
    mut transport: Box<dyn Transport>,
    mut rx_framer: Option<Box<dyn Framer>>,
    registry: PropertyRegistry,
    prefix_tx: SyncSender<PrefixEvent>,
    alive: Arc<AtomicBool>,
    handle: TransportHandle,
) {
    let mut raw_buf = [0u8; 2048];
    while alive.load(Ordering::SeqCst) {
        let frame = match &mut rx_framer {
            Some(framer) => framer.collect(transport.as_mut()),
            None => transport.read(&mut raw_buf).map(|n| raw_buf[..n].to_vec()),
        };

        let frame = match frame {
            Ok(frame) if frame.is_empty() => continue,
            Ok(frame) => frame,
            Err(e) => {
                if alive.load(Ordering::SeqCst) {
                    log::warn!("spinel reader: transport error, stopping: {e}");
                }
                break;
            }
        };

        log::trace!("rx {} bytes: {frame:02x?}", frame.len());

        let (tid, cmd_id, payload) = match packet::decode_packet(&frame) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("spinel reader: dropping unparseable packet: {e}");
                continue;
            }
        };
        log::debug!("rx tid={tid} cmd={cmd_id} payload_len={}", payload.len());

        let ctx = DecodeContext {
            handle,
            prefix_tx: Some(&prefix_tx),
        };
        if let Some(event) = dispatcher::dispatch(&registry, tid, cmd_id, &payload, &ctx) {
            let item = ResponseItem {
                property_id: event.property_id,
                value: event.value,
                tid: event.tid,
            };
            if let Err(e) = mux.on_response(item) {
                log::warn!("spinel reader: failed delivering response: {e}");
            }
        }
    }
}
