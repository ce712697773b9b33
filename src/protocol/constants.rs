//! Firebird remote protocol constants

/// Flag marking protocol versions 11 and later
pub const FB_PROTOCOL_FLAG: i32 = 0x8000;

/// Mask extracting the protocol number from a flagged version
pub const FB_PROTOCOL_MASK: i32 = !FB_PROTOCOL_FLAG & 0xFFFF;

/// Connect request layout version 2 (protocols before 13)
pub const CONNECT_VERSION2: i32 = 2;

/// Connect request layout version 3 (protocols 13 and later)
pub const CONNECT_VERSION3: i32 = 3;

/// Generic client architecture
pub const ARCH_GENERIC: i32 = 1;

/// Default Firebird port
pub const DEFAULT_PORT: u16 = 3050;

/// Operation codes
pub mod op {
    pub const CONNECT: i32 = 1;
    pub const EXIT: i32 = 2;
    pub const ACCEPT: i32 = 3;
    pub const REJECT: i32 = 4;
    pub const PROTOCOL: i32 = 5;
    pub const DISCONNECT: i32 = 6;
    pub const RESPONSE: i32 = 9;
    pub const ATTACH: i32 = 19;
    pub const CREATE: i32 = 20;
    pub const DETACH: i32 = 21;
    pub const TRANSACTION: i32 = 29;
    pub const COMMIT: i32 = 30;
    pub const ROLLBACK: i32 = 31;
    pub const CREATE_BLOB: i32 = 34;
    pub const OPEN_BLOB: i32 = 35;
    pub const GET_SEGMENT: i32 = 36;
    pub const PUT_SEGMENT: i32 = 37;
    pub const CANCEL_BLOB: i32 = 38;
    pub const CLOSE_BLOB: i32 = 39;
    pub const INFO_DATABASE: i32 = 40;
    pub const INFO_TRANSACTION: i32 = 42;
    pub const INFO_BLOB: i32 = 43;
    pub const BATCH_SEGMENTS: i32 = 44;
    pub const QUE_EVENTS: i32 = 48;
    pub const CANCEL_EVENTS: i32 = 49;
    pub const COMMIT_RETAINING: i32 = 50;
    pub const EVENT: i32 = 52;
    pub const CONNECT_REQUEST: i32 = 53;
    pub const OPEN_BLOB2: i32 = 56;
    pub const CREATE_BLOB2: i32 = 57;
    pub const SEEK_BLOB: i32 = 61;
    pub const ALLOCATE_STATEMENT: i32 = 62;
    pub const EXECUTE: i32 = 63;
    pub const EXEC_IMMEDIATE: i32 = 64;
    pub const FETCH: i32 = 65;
    pub const FETCH_RESPONSE: i32 = 66;
    pub const FREE_STATEMENT: i32 = 67;
    pub const PREPARE_STATEMENT: i32 = 68;
    pub const INFO_SQL: i32 = 70;
    pub const DUMMY: i32 = 71;
    pub const SQL_RESPONSE: i32 = 78;
    pub const DROP_DATABASE: i32 = 81;
    pub const SERVICE_ATTACH: i32 = 82;
    pub const SERVICE_DETACH: i32 = 83;
    pub const SERVICE_INFO: i32 = 84;
    pub const SERVICE_START: i32 = 85;
    pub const ROLLBACK_RETAINING: i32 = 86;
    pub const TRUSTED_AUTH: i32 = 90;
    pub const CANCEL: i32 = 91;
    pub const CONT_AUTH: i32 = 92;
    pub const PING: i32 = 93;
    pub const ACCEPT_DATA: i32 = 94;
    pub const CRYPT: i32 = 96;
    pub const CRYPT_KEY_CALLBACK: i32 = 97;
    pub const COND_ACCEPT: i32 = 98;
}

/// Protocol (packet) types
pub mod ptype {
    /// Simple remote procedure call
    pub const RPC: i32 = 2;
    /// Batch sends, no asynchrony
    pub const BATCH_SEND: i32 = 3;
    /// Batch sends with out of band messages
    pub const OUT_OF_BAND: i32 = 4;
    /// Deferred packets delivery
    pub const LAZY_SEND: i32 = 5;
    /// Mask for the type in the accept reply
    pub const MASK: i32 = 0xFF;
    /// Wire compression flag
    pub const COMPRESS_FLAG: i32 = 0x100;
}

/// User identification block tags
pub mod cnct {
    pub const USER: u8 = 1;
    pub const PASSWD: u8 = 2;
    pub const HOST: u8 = 4;
    pub const GROUP: u8 = 5;
    pub const USER_VERIFICATION: u8 = 6;
    pub const SPECIFIC_DATA: u8 = 7;
    pub const PLUGIN_NAME: u8 = 8;
    pub const LOGIN: u8 = 9;
    pub const PLUGIN_LIST: u8 = 10;
    pub const CLIENT_CRYPT: u8 = 11;
}

/// Server key block tags
pub mod key_tag {
    pub const KEY_TYPE: u8 = 0;
    pub const KEY_PLUGINS: u8 = 1;
    pub const KNOWN_PLUGINS: u8 = 2;
    pub const PLUGIN_SPECIFIC: u8 = 3;
}

/// Status vector argument types
pub mod isc_arg {
    pub const END: i32 = 0;
    pub const GDS: i32 = 1;
    pub const STRING: i32 = 2;
    pub const CSTRING: i32 = 3;
    pub const NUMBER: i32 = 4;
    pub const INTERPRETED: i32 = 5;
    pub const WARNING: i32 = 18;
    pub const SQL_STATE: i32 = 19;
}

/// Selected ISC error codes
pub mod isc {
    pub const LOGIN: i32 = 335_544_472;
    pub const NETWORK_ERROR: i32 = 335_544_721;
    pub const NET_READ_ERR: i32 = 335_544_726;
    pub const NET_WRITE_ERR: i32 = 335_544_727;
    pub const WIRECRYPT_INCOMPATIBLE: i32 = 335_545_064;
}

/// Cancel operation kinds
pub mod cancel {
    pub const DISABLE: i32 = 1;
    pub const ENABLE: i32 = 2;
    pub const RAISE: i32 = 3;
    pub const ABORT: i32 = 4;
}

/// Auxiliary connection request type for events
pub const P_REQ_ASYNC: i32 = 1;

/// Event parameter block version
pub const EPB_VERSION1: u8 = 1;

/// Blob segment status values of a get segment response
pub mod segment {
    /// Segment read completely
    pub const COMPLETE: i32 = 0;
    /// Buffer held only part of a segment
    pub const PARTIAL: i32 = 1;
    /// End of blob reached
    pub const EOF: i32 = 2;
}
