//! The `TransactionMux` (spec §4.5): matches responses to outstanding
//! requests by TID, supports blocking waits with timeout, asynchronous
//! per-property callbacks, and issuance of the four `PROP_VALUE_*`
//! request commands plus `reset`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::codec;
use crate::constants;
use crate::error::{SpinelError, SpinelResult};
use crate::format::Format;
use crate::packet;
use crate::property::PropertyOutcome;
use crate::transport::{Framer, Transport};
use crate::value::Value;

/// The default wait timeout for blocking property operations (spec §4.5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// `{ property_id, decoded_value, tid }` (spec §3). Created by the
/// `CommandDispatcher`; consumed exactly once by the matching waiter, or
/// dropped when its queue is cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseItem {
    /// The property this update concerns.
    pub property_id: u32,
    /// The decoded (or passthrough) value.
    pub value: PropertyOutcome,
    /// The TID the update arrived on.
    pub tid: u8,
}

type Subscriber = Box<dyn Fn(&ResponseItem) -> bool + Send + Sync>;

/// Construction parameters for a [`TransactionMux`].
#[derive(Clone, Copy, Debug)]
pub struct MuxConfig {
    /// Default timeout for blocking `prop_*` operations.
    pub default_timeout: Duration,
    /// Interface Identifier stamped into outgoing packet headers.
    pub host_iid: u8,
}

impl Default for MuxConfig {
    fn default() -> Self {
        MuxConfig {
            default_timeout: DEFAULT_TIMEOUT,
            host_iid: 0,
        }
    }
}

/// The transaction multiplexer. One instance is shared (via `Arc`)
/// between the reader thread, the caller threads, and (indirectly)
/// `PrefixHandler`.
pub struct TransactionMux {
    writer: Mutex<Box<dyn Transport>>,
    framer: Option<Mutex<Box<dyn Framer>>>,
    pending: Mutex<HashMap<u8, VecDeque<ResponseItem>>>,
    arrived: Condvar,
    subscribers: Mutex<HashMap<u32, Vec<Subscriber>>>,
    tid_filter: Mutex<HashSet<u8>>,
    alive: Arc<AtomicBool>,
    config: MuxConfig,
}

impl TransactionMux {
    /// Builds a mux writing through `writer`, optionally wrapping each
    /// outgoing frame with `framer`. `alive` is shared with the reader
    /// thread so shutdown is cooperative (spec §5).
    pub fn new(
        writer: Box<dyn Transport>,
        framer: Option<Box<dyn Framer>>,
        config: MuxConfig,
        alive: Arc<AtomicBool>,
    ) -> Self {
        TransactionMux {
            writer: Mutex::new(writer),
            framer: framer.map(Mutex::new),
            pending: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
            subscribers: Mutex::new(HashMap::new()),
            tid_filter: Mutex::new(HashSet::new()),
            alive,
            config,
        }
    }

    /// Non-blocking TX: frames and writes a command packet.
    pub fn transact(&self, cmd_id: u32, payload: &[u8], tid: u8) -> SpinelResult<()> {
        let frame = packet::encode_packet(cmd_id, payload, tid, self.config.host_iid);
        let bytes = match &self.framer {
            Some(framer) => framer.lock()?.encode(&frame),
            None => frame,
        };
        log::trace!("tx {} bytes on tid {tid}: {bytes:02x?}", bytes.len());
        self.writer.lock()?.write(&bytes)?;
        Ok(())
    }

    /// Marks `tid` as "of interest": subsequent matching inbound items
    /// will be enqueued rather than dropped after callback invocation.
    pub fn queue_register(&self, tid: u8) -> SpinelResult<()> {
        self.tid_filter.lock()?.insert(tid);
        self.pending.lock()?.entry(tid).or_default();
        Ok(())
    }

    /// Clears `tid`'s queue ahead of a new request, so a stale item from
    /// an earlier request cannot be mistaken for this one's reply.
    pub fn queue_wait_prepare(&self, tid: u8) -> SpinelResult<()> {
        if let Some(queue) = self.pending.lock()?.get_mut(&tid) {
            queue.clear();
        }
        Ok(())
    }

    /// Subscribes `cb` to every update of `prop_id`, in registration
    /// order. A callback returning `true` ("consumed") suppresses
    /// enqueueing that event for blocking waiters.
    pub fn callback_register<F>(&self, prop_id: u32, cb: F) -> SpinelResult<()>
    where
        F: Fn(&ResponseItem) -> bool + Send + Sync + 'static,
    {
        self.subscribers
            .lock()?
            .entry(prop_id)
            .or_default()
            .push(Box::new(cb));
        Ok(())
    }

    /// Called by the reader (via `CommandDispatcher`) for every dispatched
    /// property update. Invokes subscribers first; if none consume the
    /// event and its TID is registered, enqueues it for waiters.
    pub fn on_response(&self, item: ResponseItem) -> SpinelResult<()> {
        log::info!(
            "property {} is {:?} on tid {}",
            item.property_id,
            item.value,
            item.tid
        );

        let mut consumed = false;
        if let Some(subs) = self.subscribers.lock()?.get(&item.property_id) {
            for cb in subs {
                if cb(&item) {
                    consumed = true;
                }
            }
        }
        if consumed {
            return Ok(());
        }

        if !self.tid_filter.lock()?.contains(&item.tid) {
            return Ok(());
        }

        self.pending.lock()?.entry(item.tid).or_default().push_back(item);
        self.arrived.notify_all();
        Ok(())
    }

    /// Pulls items from `tid`'s queue until one matches `prop_id` or
    /// `timeout` elapses. Items seen but not matching are held and
    /// re-enqueued in original order before returning, so a later call
    /// still observes them in receive order (spec §4.5, §5).
    pub fn wait_for_prop(
        &self,
        prop_id: u32,
        tid: u8,
        timeout: Duration,
    ) -> SpinelResult<Option<ResponseItem>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.pending.lock()?;
        loop {
            if let Some(queue) = guard.get_mut(&tid) {
                let mut held = VecDeque::new();
                let mut found = None;
                while let Some(item) = queue.pop_front() {
                    if found.is_none() && item.property_id == prop_id {
                        found = Some(item);
                    } else {
                        held.push_back(item);
                    }
                }
                while let Some(item) = held.pop_back() {
                    queue.push_front(item);
                }
                if let Some(item) = found {
                    return Ok(Some(item));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (next_guard, _timeout_result) = self.arrived.wait_timeout(guard, deadline - now)?;
            guard = next_guard;
        }
    }

    /// Issues `CMD_PROP_VALUE_GET` and blocks for the matching `IS`.
    pub fn prop_get(
        &self,
        prop_id: u32,
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.queue_register(tid)?;
        self.queue_wait_prepare(tid)?;
        let payload = codec::encode_varint(prop_id);
        self.transact(constants::CMD_PROP_VALUE_GET, &payload, tid)?;
        self.wait_for_prop(prop_id, tid, timeout.unwrap_or(self.config.default_timeout))
    }

    /// Issues `CMD_PROP_VALUE_SET` and blocks for the matching `IS`.
    pub fn prop_set(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.queue_register(tid)?;
        self.queue_wait_prepare(tid)?;
        let mut payload = codec::encode_varint(prop_id);
        payload.extend_from_slice(&codec::encode_seq(fmt, values)?);
        self.transact(constants::CMD_PROP_VALUE_SET, &payload, tid)?;
        self.wait_for_prop(prop_id, tid, timeout.unwrap_or(self.config.default_timeout))
    }

    /// Issues `CMD_PROP_VALUE_INSERT` and blocks for the matching
    /// `INSERTED`.
    pub fn prop_insert(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.queue_register(tid)?;
        self.queue_wait_prepare(tid)?;
        let mut payload = codec::encode_varint(prop_id);
        payload.extend_from_slice(&codec::encode_seq(fmt, values)?);
        self.transact(constants::CMD_PROP_VALUE_INSERT, &payload, tid)?;
        self.wait_for_prop(prop_id, tid, timeout.unwrap_or(self.config.default_timeout))
    }

    /// Issues `CMD_PROP_VALUE_REMOVE` and blocks for the matching
    /// `REMOVED`.
    pub fn prop_remove(
        &self,
        prop_id: u32,
        fmt: &Format,
        values: &[Value],
        tid: u8,
        timeout: Option<Duration>,
    ) -> SpinelResult<Option<ResponseItem>> {
        self.queue_register(tid)?;
        self.queue_wait_prepare(tid)?;
        let mut payload = codec::encode_varint(prop_id);
        payload.extend_from_slice(&codec::encode_seq(fmt, values)?);
        self.transact(constants::CMD_PROP_VALUE_REMOVE, &payload, tid)?;
        self.wait_for_prop(prop_id, tid, timeout.unwrap_or(self.config.default_timeout))
    }

    /// Issues a reset on the asynchronous TID and awaits
    /// `LAST_STATUS == STATUS_RESET_SOFTWARE`.
    pub fn reset(&self) -> SpinelResult<bool> {
        self.queue_register(packet::TID_ASYNC)?;
        self.queue_wait_prepare(packet::TID_ASYNC)?;
        self.transact(constants::CMD_RESET, &[], packet::TID_ASYNC)?;
        let item = self.wait_for_prop(
            constants::PROP_LAST_STATUS,
            packet::TID_ASYNC,
            self.config.default_timeout,
        )?;
        Ok(matches!(
            item,
            Some(ResponseItem {
                value: PropertyOutcome::Decoded(Value::UInt(constants::STATUS_RESET_SOFTWARE)),
                ..
            })
        ))
    }
}

impl Drop for TransactionMux {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::mpsc;

    struct NullTransport {
        tx: mpsc::Sender<Vec<u8>>,
    }

    impl Transport for NullTransport {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn write(&mut self, buf: &[u8]) -> io::Result<()> {
            let _ = self.tx.send(buf.to_vec());
            Ok(())
        }
        fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
            Ok(Box::new(NullTransport { tx: self.tx.clone() }))
        }
    }

    fn mux() -> (Arc<TransactionMux>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let mux = TransactionMux::new(Box::new(NullTransport { tx }), None, MuxConfig::default(), alive);
        (Arc::new(mux), rx)
    }

    fn item(prop: u32, tid: u8, v: u32) -> ResponseItem {
        ResponseItem {
            property_id: prop,
            value: PropertyOutcome::Decoded(Value::UInt(v)),
            tid,
        }
    }

    #[test]
    fn wait_times_out_with_no_reply() {
        let (mux, _rx) = mux();
        mux.queue_register(1).unwrap();
        let got = mux.wait_for_prop(999, 1, Duration::from_millis(20)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn timeout_then_later_item_on_same_tid_still_observable() {
        let (mux, _rx) = mux();
        mux.queue_register(1).unwrap();
        assert!(mux.wait_for_prop(999, 1, Duration::from_millis(10)).unwrap().is_none());

        mux.on_response(item(constants::PROP_NCP_VERSION, 1, 7)).unwrap();
        let got = mux.wait_for_prop(constants::PROP_NCP_VERSION, 1, Duration::from_millis(50)).unwrap();
        assert_eq!(got.unwrap().property_id, constants::PROP_NCP_VERSION);
    }

    #[test]
    fn skipped_items_preserve_order() {
        let (mux, _rx) = mux();
        mux.queue_register(1).unwrap();
        mux.on_response(item(1, 1, 10)).unwrap();
        mux.on_response(item(2, 1, 20)).unwrap();
        mux.on_response(item(3, 1, 30)).unwrap();

        // Ask for property 2 first: 1 and 3 should be held, in order.
        let got = mux.wait_for_prop(2, 1, Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(got.property_id, 2);

        let first = mux.wait_for_prop(1, 1, Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(first.property_id, 1);
        let second = mux.wait_for_prop(3, 1, Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(second.property_id, 3);
    }

    #[test]
    fn unregistered_tid_is_dropped_not_enqueued() {
        let (mux, _rx) = mux();
        // Never call queue_register(1).
        mux.on_response(item(1, 1, 10)).unwrap();
        let got = mux.wait_for_prop(1, 1, Duration::from_millis(10)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn consumed_callback_suppresses_enqueue() {
        let (mux, _rx) = mux();
        mux.queue_register(1).unwrap();
        mux.callback_register(constants::PROP_NCP_VERSION, |_item| true).unwrap();
        mux.on_response(item(constants::PROP_NCP_VERSION, 1, 3)).unwrap();
        let got = mux.wait_for_prop(constants::PROP_NCP_VERSION, 1, Duration::from_millis(20)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn non_consuming_callback_still_enqueues() {
        let (mux, _rx) = mux();
        mux.queue_register(1).unwrap();
        mux.callback_register(constants::PROP_NCP_VERSION, |_item| false).unwrap();
        mux.on_response(item(constants::PROP_NCP_VERSION, 1, 3)).unwrap();
        let got = mux.wait_for_prop(constants::PROP_NCP_VERSION, 1, Duration::from_millis(20)).unwrap();
        assert!(got.is_some());
    }

    #[test]
    fn reset_succeeds_on_matching_last_status() {
        let (mux, rx) = mux();
        let mux2 = Arc::clone(&mux);
        let handle = std::thread::spawn(move || mux2.reset());
        // Wait for the reset command to actually be written before replying.
        let _written = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        mux.on_response(ResponseItem {
            property_id: constants::PROP_LAST_STATUS,
            value: PropertyOutcome::Decoded(Value::UInt(constants::STATUS_RESET_SOFTWARE)),
            tid: packet::TID_ASYNC,
        })
        .unwrap();
        assert!(handle.join().unwrap().unwrap());
    }

    #[test]
    fn reset_fails_on_timeout() {
        let (tx, _rx) = mpsc::channel();
        let mux = TransactionMux::new(
            Box::new(NullTransport { tx }),
            None,
            MuxConfig { default_timeout: Duration::from_millis(20), ..MuxConfig::default() },
            Arc::new(AtomicBool::new(true)),
        );
        let result = mux.reset().unwrap();
        assert!(!result);
    }

    #[test]
    fn drop_clears_alive_flag() {
        let alive = Arc::new(AtomicBool::new(true));
        {
            let (tx, _rx) = mpsc::channel();
            let mux = TransactionMux::new(Box::new(NullTransport { tx }), None, MuxConfig::default(), Arc::clone(&alive));
            drop(mux);
        }
        assert!(!alive.load(Ordering::SeqCst));
    }
}
