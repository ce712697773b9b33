//! Parameter buffer tags

/// Database parameter buffer tags
pub mod dpb {
    pub const VERSION1: u8 = 1;
    pub const VERSION2: u8 = 2;
    pub const PAGE_SIZE: u8 = 4;
    pub const NUM_BUFFERS: u8 = 5;
    pub const SWEEP_INTERVAL: u8 = 22;
    pub const FORCE_WRITE: u8 = 24;
    pub const USER_NAME: u8 = 28;
    pub const PASSWORD: u8 = 29;
    pub const PASSWORD_ENC: u8 = 30;
    pub const LC_CTYPE: u8 = 48;
    pub const CONNECT_TIMEOUT: u8 = 57;
    pub const DUMMY_PACKET_INTERVAL: u8 = 58;
    pub const SQL_ROLE_NAME: u8 = 60;
    pub const SQL_DIALECT: u8 = 63;
    pub const SET_DB_CHARSET: u8 = 68;
    pub const PROCESS_ID: u8 = 71;
    pub const TRUSTED_AUTH: u8 = 73;
    pub const PROCESS_NAME: u8 = 74;
    pub const UTF8_FILENAME: u8 = 77;
    pub const SPECIFIC_AUTH_DATA: u8 = 84;
    pub const AUTH_PLUGIN_LIST: u8 = 85;
    pub const AUTH_PLUGIN_NAME: u8 = 86;
    pub const CONFIG: u8 = 87;
    pub const SESSION_TIME_ZONE: u8 = 91;

    /// Tags whose value is an integer
    pub(crate) const NUMERIC: &[u8] = &[
        PAGE_SIZE,
        NUM_BUFFERS,
        SWEEP_INTERVAL,
        FORCE_WRITE,
        CONNECT_TIMEOUT,
        DUMMY_PACKET_INTERVAL,
        SQL_DIALECT,
        PROCESS_ID,
    ];
}

/// Transaction parameter buffer tags
pub mod tpb {
    pub const VERSION1: u8 = 1;
    pub const VERSION3: u8 = 3;
    pub const CONSISTENCY: u8 = 1;
    pub const CONCURRENCY: u8 = 2;
    pub const SHARED: u8 = 3;
    pub const PROTECTED: u8 = 4;
    pub const EXCLUSIVE: u8 = 5;
    pub const WAIT: u8 = 6;
    pub const NOWAIT: u8 = 7;
    pub const READ: u8 = 8;
    pub const WRITE: u8 = 9;
    pub const LOCK_READ: u8 = 10;
    pub const LOCK_WRITE: u8 = 11;
    pub const VERB_TIME: u8 = 12;
    pub const COMMIT_TIME: u8 = 13;
    pub const IGNORE_LIMBO: u8 = 14;
    pub const READ_COMMITTED: u8 = 15;
    pub const AUTOCOMMIT: u8 = 16;
    pub const REC_VERSION: u8 = 17;
    pub const NO_REC_VERSION: u8 = 18;
    pub const RESTART_REQUESTS: u8 = 19;
    pub const NO_AUTO_UNDO: u8 = 20;
    pub const LOCK_TIMEOUT: u8 = 21;
}

/// Service parameter buffer tags
pub mod spb {
    pub const VERSION1: u8 = 1;
    pub const CURRENT_VERSION: u8 = 2;
    pub const VERSION3: u8 = 3;
    pub const USER_NAME: u8 = 28;
    pub const PASSWORD: u8 = 29;
    pub const PASSWORD_ENC: u8 = 30;
    pub const CONNECT_TIMEOUT: u8 = 57;
    pub const DUMMY_PACKET_INTERVAL: u8 = 58;
    pub const SQL_ROLE_NAME: u8 = 60;
    pub const PROCESS_ID: u8 = 71;
    pub const TRUSTED_AUTH: u8 = 73;
    pub const PROCESS_NAME: u8 = 74;
    pub const SPECIFIC_AUTH_DATA: u8 = 84;
    pub const AUTH_PLUGIN_LIST: u8 = 85;
    pub const AUTH_PLUGIN_NAME: u8 = 86;
    pub const DBNAME: u8 = 106;
    pub const OPTIONS: u8 = 108;

    pub(crate) const NUMERIC: &[u8] = &[CONNECT_TIMEOUT, DUMMY_PACKET_INTERVAL, PROCESS_ID];
}

/// Blob parameter buffer tags
pub mod bpb {
    pub const VERSION1: u8 = 1;
    pub const SOURCE_TYPE: u8 = 1;
    pub const TARGET_TYPE: u8 = 2;
    pub const TYPE: u8 = 3;
    pub const SOURCE_INTERP: u8 = 4;
    pub const TARGET_INTERP: u8 = 5;
    pub const FILTER_PARAMETER: u8 = 6;
    pub const STORAGE: u8 = 7;

    pub const TYPE_SEGMENTED: u8 = 0;
    pub const TYPE_STREAM: u8 = 1;
}
