//! The `PrefixHandler` (spec §4.6): a single background worker that
//! parses `THREAD_ON_MESH_NETS` payloads off the reader path so the
//! reader never blocks on SLAAC bookkeeping.

use std::collections::HashSet;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::codec;
use crate::format::FormatDescriptor;
use crate::transport::TransportHandle;

/// Bit in the on-mesh-net entry's flags byte marking the prefix for
/// stateless address autoconfiguration. Matches the reference's
/// `SPINEL_NET_FLAG_SLAAC` (spec §4.6, §9 "SLAAC is a stub").
pub const NET_FLAG_SLAAC: u8 = 1 << 4;

/// One `(transport_handle, raw_payload)` tuple enqueued by the
/// `PropertyDecoder` when it decodes `THREAD_ON_MESH_NETS` (spec §4.3).
#[derive(Clone, Debug)]
pub struct PrefixEvent {
    /// Which transport/link this update arrived on.
    pub handle: TransportHandle,
    /// The raw `THREAD_ON_MESH_NETS` property payload.
    pub payload: Vec<u8>,
}

/// An IPv6 prefix truncated to its declared length, as advertised by an
/// on-mesh-net entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ipv6Net {
    /// The prefix bytes, with bits beyond `len` zeroed.
    pub addr: [u8; 16],
    /// Declared prefix length in bits.
    pub len: u8,
}

impl Ipv6Net {
    fn truncated(mut addr: [u8; 16], len: u8) -> Self {
        let len = len.min(128);
        let full_bytes = (len / 8) as usize;
        let rem_bits = len % 8;
        if full_bytes < 16 {
            if rem_bits > 0 {
                let mask = 0xFFu8 << (8 - rem_bits);
                addr[full_bytes] &= mask;
            } else {
                addr[full_bytes] = 0;
            }
            for byte in &mut addr[full_bytes + 1..] {
                *byte = 0;
            }
        }
        Ipv6Net { addr, len }
    }
}

/// One decoded on-mesh-net table entry: `t(6CCCC)` -- prefix, prefix
/// length, stable flag, flags byte, local flag.
struct OnMeshEntry {
    net: Ipv6Net,
    slaac: bool,
}

fn parse_entries(payload: &[u8]) -> Vec<OnMeshEntry> {
    let fmt = FormatDescriptor::parse("A(t(6CCCC))").expect("format literal is well-formed");
    let records = match codec::decode_seq(payload, fmt.elems()) {
        Ok(mut values) => match values.pop() {
            Some(crate::value::Value::Array(records)) => records,
            _ => return Vec::new(),
        },
        Err(e) => {
            log::warn!("dropping malformed THREAD_ON_MESH_NETS payload: {e}");
            return Vec::new();
        }
    };

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let Some(crate::value::Value::Struct(fields)) = record.into_iter().next() else {
            continue;
        };
        let (Some(prefix), Some(prefix_len), Some(_stable), Some(flags), Some(_local)) = (
            fields.first(),
            fields.get(1),
            fields.get(2),
            fields.get(3),
            fields.get(4),
        ) else {
            continue;
        };
        let (crate::value::Value::Ipv6(addr), crate::value::Value::U8(len), crate::value::Value::U8(flags_byte)) =
            (prefix, prefix_len, flags)
        else {
            continue;
        };
        let net = Ipv6Net::truncated(*addr, *len);
        entries.push(OnMeshEntry {
            net,
            slaac: flags_byte & NET_FLAG_SLAAC != 0,
        });
    }
    entries
}

/// The PrefixHandler worker. Runs on its own thread of execution,
/// draining a bounded queue of [`PrefixEvent`]s one at a time.
pub struct PrefixHandler {
    configured: HashSet<Ipv6Net>,
}

impl PrefixHandler {
    /// Creates a handler with an empty auto-configured address cache.
    pub fn new() -> Self {
        PrefixHandler {
            configured: HashSet::new(),
        }
    }

    /// Processes one inbound event: diffs the advertised SLAAC prefixes
    /// against the cached configured set and logs additions/removals.
    ///
    /// Per spec §9 this is a stub: the reference implementation logs but
    /// does not apply the resulting address changes, and neither does
    /// this one. Applying changes is left as an extension point behind
    /// the `slaac` feature.
    pub fn handle_prefix_change(&mut self, event: &PrefixEvent) {
        let entries = parse_entries(&event.payload);
        let current: HashSet<Ipv6Net> = entries.iter().filter(|e| e.slaac).map(|e| e.net).collect();

        #[cfg(feature = "slaac")]
        {
            for added in current.difference(&self.configured) {
                log::info!(
                    "transport {}: would configure SLAAC address for {:?}/{}",
                    event.handle,
                    added.addr,
                    added.len
                );
            }
            for removed in self.configured.difference(&current) {
                log::info!(
                    "transport {}: would remove SLAAC address for {:?}/{}",
                    event.handle,
                    removed.addr,
                    removed.len
                );
            }
        }

        self.configured = current;
    }

    /// Runs the worker loop until the channel is closed. Intended to be
    /// spawned on its own `std::thread`.
    pub fn run(mut self, rx: Receiver<PrefixEvent>) {
        loop {
            match rx.recv_timeout(Duration::from_secs(3600)) {
                Ok(event) => self.handle_prefix_change(&event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

impl Default for PrefixHandler {
    fn default() -> Self {
        Self::new()
    }
}
