//! A deliberately small slice of the Spinel command and property
//! identifier space.
//!
//! The full enum of command and property identifiers is explicitly out
//! of scope per spec §1 ("content of the constants module") and is
//! expected to be supplied by the application alongside a vendor
//! [`crate::property::PropertyRegistry`] extension. The identifiers
//! below are exactly the ones named by spec.md's component descriptions
//! and worked examples, kept here so the dispatcher, registry, and
//! TransactionMux have something concrete to test against.

/// Resets the NCP. Reply arrives on [`TID_ASYNC`](crate::packet::TID_ASYNC)
/// as `PROP_LAST_STATUS == STATUS_RESET_SOFTWARE`.
pub const CMD_RESET: u32 = 1;
/// Reads a property's current value.
pub const CMD_PROP_VALUE_GET: u32 = 2;
/// Writes a property's value.
pub const CMD_PROP_VALUE_SET: u32 = 3;
/// Inserts a value into a list-valued property.
pub const CMD_PROP_VALUE_INSERT: u32 = 4;
/// Removes a value from a list-valued property.
pub const CMD_PROP_VALUE_REMOVE: u32 = 5;
/// Unsolicited or reply notification: a property's current value.
pub const CMD_PROP_VALUE_IS: u32 = 6;
/// Unsolicited notification: a value was added to a list-valued property.
pub const CMD_PROP_VALUE_INSERTED: u32 = 7;
/// Unsolicited notification: a value was removed from a list-valued property.
pub const CMD_PROP_VALUE_REMOVED: u32 = 8;

/// Last operation status, format `i`.
pub const PROP_LAST_STATUS: u32 = 0;
/// Spinel protocol version, format `i`.
pub const PROP_PROTOCOL_VERSION: u32 = 1;
/// NCP firmware version string, format `U`.
pub const PROP_NCP_VERSION: u32 = 2;
/// NCP interface type, format `i`.
pub const PROP_INTERFACE_TYPE: u32 = 3;
/// MAC allowlist; polymorphic payload, see [`crate::property`].
pub const PROP_MAC_ALLOWLIST: u32 = 0x40;
/// Thread on-mesh network prefixes; drives [`crate::prefix::PrefixHandler`].
pub const PROP_THREAD_ON_MESH_NETS: u32 = 0x5c;
/// Thread child table; `INSERTED`/`REMOVED` notifications are ignored for
/// this property (spec §4.4), only full-table `IS` snapshots surface.
pub const PROP_THREAD_CHILD_TABLE: u32 = 0x63;

/// `LAST_STATUS` value confirming a successful software reset.
pub const STATUS_RESET_SOFTWARE: u32 = 114;
