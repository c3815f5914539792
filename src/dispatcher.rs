//! The `CommandDispatcher` (spec §4.4): recognizes the small set of
//! inbound commands this crate understands, peels the property
//! identifier, and calls the [`PropertyRegistry`].

use crate::codec;
use crate::constants;
use crate::property::{DecodeContext, PropertyOutcome, PropertyRegistry};

/// Which of the three recognized commands produced a [`DispatchedEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// `PROP_VALUE_IS`
    Is,
    /// `PROP_VALUE_INSERTED`
    Inserted,
    /// `PROP_VALUE_REMOVED`
    Removed,
}

/// One dispatched property update, ready to be handed to
/// [`crate::transaction::TransactionMux::on_response`].
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchedEvent {
    /// Which command produced this event.
    pub kind: EventKind,
    /// The property identifier the payload began with.
    pub property_id: u32,
    /// The decoded (or passthrough) value.
    pub value: PropertyOutcome,
    /// The TID carried by the inbound packet's header.
    pub tid: u8,
}

/// Dispatches one inbound `(tid, cmd_id, payload)` packet.
///
/// Returns `None` when the command is not one of the three
/// `PROP_VALUE_*` family, or when it is a `THREAD_CHILD_TABLE`
/// `INSERTED`/`REMOVED` notification, which is deliberately ignored
/// (spec §4.4: only full-table `IS` snapshots are surfaced).
pub fn dispatch(
    registry: &PropertyRegistry,
    tid: u8,
    cmd_id: u32,
    payload: &[u8],
    ctx: &DecodeContext<'_>,
) -> Option<DispatchedEvent> {
    let kind = match cmd_id {
        c if c == constants::CMD_PROP_VALUE_IS => EventKind::Is,
        c if c == constants::CMD_PROP_VALUE_INSERTED => EventKind::Inserted,
        c if c == constants::CMD_PROP_VALUE_REMOVED => EventKind::Removed,
        other => {
            log::debug!("dispatcher: discarding unrecognized command id {other}");
            return None;
        }
    };

    let (property_id, consumed) = match codec::decode_varint(payload) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("dispatcher: dropping packet with malformed property id: {e}");
            return None;
        }
    };

    if property_id == constants::PROP_THREAD_CHILD_TABLE && kind != EventKind::Is {
        log::debug!("dispatcher: ignoring THREAD_CHILD_TABLE {kind:?} notification");
        return None;
    }

    let value = registry.decode(property_id, &payload[consumed..], ctx);
    Some(DispatchedEvent {
        kind,
        property_id,
        value,
        tid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_varint;
    use crate::value::Value;

    fn ctx() -> DecodeContext<'static> {
        DecodeContext { handle: 0, prefix_tx: None }
    }

    #[test]
    fn dispatches_value_is() {
        let reg = PropertyRegistry::base();
        let mut payload = encode_varint(constants::PROP_LAST_STATUS);
        payload.push(0x00);
        let event = dispatch(&reg, 0, constants::CMD_PROP_VALUE_IS, &payload, &ctx()).unwrap();
        assert_eq!(event.kind, EventKind::Is);
        assert_eq!(event.property_id, constants::PROP_LAST_STATUS);
        assert_eq!(event.value, PropertyOutcome::Decoded(Value::UInt(0)));
    }

    #[test]
    fn ignores_child_table_inserted() {
        let reg = PropertyRegistry::base();
        let mut payload = encode_varint(constants::PROP_THREAD_CHILD_TABLE);
        payload.extend_from_slice(&[1, 2, 3]);
        assert!(dispatch(&reg, 0, constants::CMD_PROP_VALUE_INSERTED, &payload, &ctx()).is_none());
    }

    #[test]
    fn surfaces_child_table_is() {
        let reg = PropertyRegistry::base();
        let mut payload = encode_varint(constants::PROP_THREAD_CHILD_TABLE);
        payload.extend_from_slice(&[1, 2, 3]);
        assert!(dispatch(&reg, 0, constants::CMD_PROP_VALUE_IS, &payload, &ctx()).is_some());
    }

    #[test]
    fn unrecognized_command_discarded() {
        let reg = PropertyRegistry::base();
        assert!(dispatch(&reg, 0, 99, &[0x00], &ctx()).is_none());
    }
}
