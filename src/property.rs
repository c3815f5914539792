//! The `PropertyDecoder` (spec §4.3): a static registry mapping property
//! identifiers to a precompiled [`FormatDescriptor`] (or, for polymorphic
//! properties, a fixed-order list of candidates).

use std::collections::HashMap;
use std::sync::mpsc::SyncSender;

use crate::codec;
use crate::constants;
use crate::format::FormatDescriptor;
use crate::prefix::PrefixEvent;
use crate::transport::TransportHandle;
use crate::value::Value;

/// The outcome of decoding one property payload.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyOutcome {
    /// Decoded successfully against a known format.
    Decoded(Value),
    /// A polymorphic property (e.g. `MAC_ALLOWLIST`) for which none of
    /// the candidate formats matched.
    Null,
    /// The property identifier was not in the registry; the payload
    /// passes through as raw bytes for the caller to log and inspect.
    RawUnknown(Vec<u8>),
}

/// Collapses a decoded record down to a single `Value`: a one-element
/// record decodes to that element directly rather than a one-field
/// `Struct`, which is the common case (most properties have one field).
fn collapse(mut record: Vec<Value>) -> Value {
    if record.len() == 1 {
        record.pop().expect("len checked above")
    } else {
        Value::Struct(record)
    }
}

enum PostDecodeHook {
    OnMeshNets,
}

struct PropertyEntry {
    /// Candidate formats, tried in order; the first that both parses and
    /// consumes the entire payload wins (spec §4.3).
    candidates: Vec<FormatDescriptor>,
    hook: Option<PostDecodeHook>,
}

/// Context needed to decode a property payload: where to forward
/// `THREAD_ON_MESH_NETS` updates for asynchronous, off-reader-thread
/// processing (spec §4.3: "must never be invoked inline from the reader
/// thread").
pub struct DecodeContext<'a> {
    /// Identifies which transport the payload arrived on.
    pub handle: TransportHandle,
    /// Sender half of the bounded channel feeding `PrefixHandler`. `None`
    /// disables prefix-change forwarding entirely (e.g. in tests that
    /// don't care about it).
    pub prefix_tx: Option<&'a SyncSender<PrefixEvent>>,
}

/// The property registry. Construct with [`PropertyRegistry::base`] and
/// optionally extend with [`PropertyRegistry::merge`] for vendor
/// properties (spec §6, "Vendor extension hook").
pub struct PropertyRegistry {
    entries: HashMap<u32, PropertyEntry>,
}

impl PropertyRegistry {
    /// Builds the registry covering the properties named in spec.md's
    /// worked examples and component descriptions. See [`crate::constants`]
    /// for why this is a small, explicit subset rather than the full
    /// vendor enum.
    pub fn base() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            constants::PROP_LAST_STATUS,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("i").expect("literal")],
                hook: None,
            },
        );
        entries.insert(
            constants::PROP_PROTOCOL_VERSION,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("ii").expect("literal")],
                hook: None,
            },
        );
        entries.insert(
            constants::PROP_NCP_VERSION,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("U").expect("literal")],
                hook: None,
            },
        );
        entries.insert(
            constants::PROP_INTERFACE_TYPE,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("i").expect("literal")],
                hook: None,
            },
        );
        entries.insert(
            constants::PROP_MAC_ALLOWLIST,
            PropertyEntry {
                candidates: vec![
                    FormatDescriptor::parse("A(t(EC))").expect("literal"),
                    FormatDescriptor::parse("EC").expect("literal"),
                    FormatDescriptor::parse("E").expect("literal"),
                ],
                hook: None,
            },
        );
        entries.insert(
            constants::PROP_THREAD_ON_MESH_NETS,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("D").expect("literal")],
                hook: Some(PostDecodeHook::OnMeshNets),
            },
        );
        entries.insert(
            constants::PROP_THREAD_CHILD_TABLE,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse("D").expect("literal")],
                hook: None,
            },
        );
        PropertyRegistry { entries }
    }

    /// Merges a vendor-supplied registry into this one, overriding this
    /// registry's entries on identifier collision (spec §6).
    pub fn merge(&mut self, other: PropertyRegistry) {
        for (id, entry) in other.entries {
            self.entries.insert(id, entry);
        }
    }

    /// Registers or overrides a single property with a single format.
    /// A convenience for vendor registries simpler than a full
    /// [`PropertyRegistry`].
    pub fn register(&mut self, property_id: u32, format: &str) -> Result<(), crate::error::SpinelError> {
        self.entries.insert(
            property_id,
            PropertyEntry {
                candidates: vec![FormatDescriptor::parse(format)?],
                hook: None,
            },
        );
        Ok(())
    }

    /// Decodes `payload` for `property_id`, invoking any post-decode hook.
    pub fn decode(&self, property_id: u32, payload: &[u8], ctx: &DecodeContext<'_>) -> PropertyOutcome {
        let Some(entry) = self.entries.get(&property_id) else {
            log::warn!("unknown property id {property_id}, passing through raw bytes");
            return PropertyOutcome::RawUnknown(payload.to_vec());
        };

        let mut decoded = None;
        for candidate in &entry.candidates {
            match codec::decode_seq(payload, candidate.elems()) {
                Ok(record) => match codec::measure_seq(payload, candidate.elems()) {
                    Ok(n) if n == payload.len() => {
                        decoded = Some(collapse(record));
                        break;
                    }
                    _ => continue,
                },
                Err(_) => continue,
            }
        }

        if let Some(PostDecodeHook::OnMeshNets) = entry.hook {
            if let Some(tx) = ctx.prefix_tx {
                let event = PrefixEvent {
                    handle: ctx.handle,
                    payload: payload.to_vec(),
                };
                if let Err(e) = tx.try_send(event) {
                    log::warn!("dropping THREAD_ON_MESH_NETS update: prefix queue {e}");
                }
            }
        }

        match decoded {
            Some(value) => PropertyOutcome::Decoded(value),
            None => PropertyOutcome::Null,
        }
    }
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::base()
    }
}
