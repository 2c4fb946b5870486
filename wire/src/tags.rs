//! Tag bytes normative to the wire format. See the top-level design document, §4.1/§6.

/// `Data` tag: `Int(i64)`.
pub const DATA_INT: u8 = 0x01;
/// `Data` tag: `String`.
pub const DATA_STRING: u8 = 0x02;
/// `Data` tag: `List`.
pub const DATA_LIST: u8 = 0x03;
/// `Data` tag: `Object(ObjectId)`.
pub const DATA_OBJECT: u8 = 0x04;

/// Command tag: evaluate code for its side effects, reply with an empty `List`.
pub const CMD_EVAL_CODE: u8 = 0x01;
/// Command tag: evaluate code to a value, store it, reply with its new `ObjectId`.
pub const CMD_STORE_EXPR: u8 = 0x04;
/// Command tag: apply a stored function to a `Data` argument, reply with the result.
pub const CMD_APPLY: u8 = 0x07;
/// Command tag: remove a `List` of `Int` ids from the store.
pub const CMD_REMOVE: u8 = 0x08;

/// Reply tag: success, payload is one `Data`.
pub const REPLY_OK: u8 = 0x01;
/// Reply tag: failure, payload is a length-prefixed error string.
pub const REPLY_ERR: u8 = 0x02;
