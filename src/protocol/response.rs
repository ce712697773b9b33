//! Server responses and status vectors

use super::constants::{isc_arg, op};
use crate::xdr::XdrReader;
use crate::{Error, Result};
use std::fmt;
use tokio::io::AsyncRead;

/// One entry of a status vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusArg {
    /// Error code
    Gds(i32),
    /// Warning code
    Warning(i32),
    /// Fully interpreted message text
    Interpreted(String),
    /// String parameter of the preceding code
    Str(String),
    /// Numeric parameter of the preceding code
    Number(i32),
    /// SQLSTATE of the error
    SqlState(String),
}

/// Status vector sent in `op_response`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusVector {
    args: Vec<StatusArg>,
}

impl StatusVector {
    /// Build a status vector from its entries
    pub fn new(args: Vec<StatusArg>) -> Self {
        Self { args }
    }

    /// Entries in wire order
    pub fn args(&self) -> &[StatusArg] {
        &self.args
    }

    /// Whether the server reported nothing
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// First error code, if any
    pub fn error_code(&self) -> Option<i32> {
        self.args.iter().find_map(|arg| match arg {
            StatusArg::Gds(code) => Some(*code),
            _ => None,
        })
    }

    /// Whether the vector holds an error
    pub fn is_error(&self) -> bool {
        self.error_code().is_some()
    }

    /// Whether the vector holds only warnings
    pub fn is_warning(&self) -> bool {
        !self.is_error() && self.args.iter().any(|a| matches!(a, StatusArg::Warning(_)))
    }

    /// SQLSTATE reported with the error
    pub fn sql_state(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            StatusArg::SqlState(state) => Some(state.as_str()),
            _ => None,
        })
    }

    /// Decode the status vector of a response
    ///
    /// Arguments other than the known string types are followed by a
    /// numeric parameter.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut XdrReader<R>) -> Result<Self> {
        let mut args = Vec::new();
        loop {
            let arg = reader.read_int().await?;
            match arg {
                isc_arg::END => break,
                isc_arg::GDS => {
                    let code = reader.read_int().await?;
                    if code != 0 {
                        args.push(StatusArg::Gds(code));
                    }
                }
                isc_arg::WARNING => {
                    let code = reader.read_int().await?;
                    if code != 0 {
                        args.push(StatusArg::Warning(code));
                    }
                }
                isc_arg::INTERPRETED => args.push(StatusArg::Interpreted(reader.read_string().await?)),
                isc_arg::STRING => args.push(StatusArg::Str(reader.read_string().await?)),
                isc_arg::SQL_STATE => args.push(StatusArg::SqlState(reader.read_string().await?)),
                _ => args.push(StatusArg::Number(reader.read_int().await?)),
            }
        }
        Ok(Self { args })
    }
}

impl fmt::Display for StatusVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.args {
            let sep = if first { "" } else { "; " };
            match arg {
                StatusArg::Gds(code) => write!(f, "{}isc error {}", sep, code)?,
                StatusArg::Warning(code) => write!(f, "{}isc warning {}", sep, code)?,
                StatusArg::Interpreted(text) => write!(f, "{}{}", sep, text)?,
                StatusArg::Str(text) => write!(f, " [{}]", text)?,
                StatusArg::Number(n) => write!(f, " [{}]", n)?,
                StatusArg::SqlState(_) => continue,
            }
            first = false;
        }
        if let Some(state) = self.sql_state() {
            write!(f, " [SQLState:{}]", state)?;
        }
        Ok(())
    }
}

/// Receives status vectors that carry only warnings
pub trait WarningCallback: Send + Sync {
    /// Called once per warning status vector
    fn on_warning(&self, warning: &StatusVector);
}

impl<F> WarningCallback for F
where
    F: Fn(&StatusVector) + Send + Sync,
{
    fn on_warning(&self, warning: &StatusVector) {
        self(warning)
    }
}

/// Logs warnings through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultWarningCallback;

impl WarningCallback for DefaultWarningCallback {
    fn on_warning(&self, warning: &StatusVector) {
        tracing::warn!(warning = %warning, "server warning");
    }
}

/// Response to most operations (`op_response`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericResponse {
    /// Handle of the object the request created or addressed
    pub object_handle: i32,
    /// Blob id, for blob operations
    pub blob_id: i64,
    /// Operation specific payload
    pub data: Vec<u8>,
    /// Server status
    pub status: StatusVector,
}

impl GenericResponse {
    /// Decode the body of an `op_response`
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut XdrReader<R>) -> Result<Self> {
        let object_handle = reader.read_int().await?;
        let blob_id = reader.read_long().await?;
        let data = reader.read_buffer().await?;
        let status = StatusVector::read_from(reader).await?;
        Ok(Self {
            object_handle,
            blob_id,
            data,
            status,
        })
    }

    /// Turn an error status into [`Error::Server`]; hand warnings to `callback`
    pub fn into_result(self, callback: &dyn WarningCallback) -> Result<Self> {
        if self.status.is_error() {
            return Err(Error::Server(self.status));
        }
        if self.status.is_warning() {
            callback.on_warning(&self.status);
        }
        Ok(self)
    }
}

/// Response to `op_fetch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchResponse {
    /// Fetch status (0 more rows, 100 end of cursor)
    pub status: i32,
    /// Number of rows that follow
    pub count: i32,
}

/// Response to `op_execute2` and `op_exec_immediate2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlResponse {
    /// Number of messages that follow
    pub count: i32,
}

/// Any response the engine decodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `op_response`
    Generic(GenericResponse),
    /// `op_fetch_response`
    Fetch(FetchResponse),
    /// `op_sql_response`
    Sql(SqlResponse),
}

impl Response {
    /// Decode the body of a response whose opcode was already read
    pub async fn read_from<R: AsyncRead + Unpin>(
        operation: i32,
        reader: &mut XdrReader<R>,
    ) -> Result<Self> {
        match operation {
            op::RESPONSE => Ok(Response::Generic(GenericResponse::read_from(reader).await?)),
            op::FETCH_RESPONSE => {
                let status = reader.read_int().await?;
                let count = reader.read_int().await?;
                Ok(Response::Fetch(FetchResponse { status, count }))
            }
            op::SQL_RESPONSE => {
                let count = reader.read_int().await?;
                Ok(Response::Sql(SqlResponse { count }))
            }
            other => Err(Error::Protocol(format!("unexpected operation code {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::isc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn int(v: i32) -> Vec<u8> {
        v.to_be_bytes().to_vec()
    }

    fn string(s: &str) -> Vec<u8> {
        let mut out = int(s.len() as i32);
        out.extend_from_slice(s.as_bytes());
        out.resize(out.len() + crate::xdr::padding(s.len()), 0);
        out
    }

    fn login_failure() -> Vec<u8> {
        [
            int(isc_arg::GDS),
            int(isc::LOGIN),
            int(isc_arg::STRING),
            string("SYSDBA"),
            int(isc_arg::SQL_STATE),
            string("28000"),
            int(isc_arg::END),
        ]
        .concat()
    }

    #[tokio::test]
    async fn test_read_error_status() {
        let bytes = login_failure();
        let mut r = XdrReader::new(&bytes[..]);
        let status = StatusVector::read_from(&mut r).await.unwrap();
        assert_eq!(status.error_code(), Some(isc::LOGIN));
        assert_eq!(status.sql_state(), Some("28000"));
        assert!(status.is_error());
        let text = status.to_string();
        assert!(text.contains("335544472"));
        assert!(text.contains("[SYSDBA]"));
        assert!(text.ends_with("[SQLState:28000]"));
    }

    #[tokio::test]
    async fn test_zero_gds_is_success() {
        let bytes = [int(isc_arg::GDS), int(0), int(isc_arg::END)].concat();
        let mut r = XdrReader::new(&bytes[..]);
        let status = StatusVector::read_from(&mut r).await.unwrap();
        assert!(status.is_empty());
    }

    #[tokio::test]
    async fn test_generic_response_and_warning_callback() {
        let bytes = [
            int(op::RESPONSE),
            int(7),
            0x0000_0001_0000_0002i64.to_be_bytes().to_vec(),
            string("ok"),
            int(isc_arg::WARNING),
            int(335_544_808),
            int(isc_arg::NUMBER),
            int(3),
            int(isc_arg::END),
        ]
        .concat();
        let mut r = XdrReader::new(&bytes[..]);
        let operation = r.read_int().await.unwrap();
        let response = match Response::read_from(operation, &mut r).await.unwrap() {
            Response::Generic(g) => g,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(response.object_handle, 7);
        assert_eq!(response.blob_id, 0x0000_0001_0000_0002);
        assert_eq!(response.data, b"ok");
        assert!(response.status.is_warning());

        let calls = AtomicUsize::new(0);
        let callback = |_: &StatusVector| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let response = response.into_result(&callback).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.object_handle, 7);
    }

    #[tokio::test]
    async fn test_error_response_becomes_server_error() {
        let bytes = [int(0), 0i64.to_be_bytes().to_vec(), int(0), login_failure()].concat();
        let mut r = XdrReader::new(&bytes[..]);
        let response = GenericResponse::read_from(&mut r).await.unwrap();
        let err = response.into_result(&DefaultWarningCallback).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.error_code(), Some(isc::LOGIN));
    }

    #[tokio::test]
    async fn test_fetch_and_sql_responses() {
        let bytes = [int(100), int(0), int(1)].concat();
        let mut r = XdrReader::new(&bytes[..]);
        assert_eq!(
            Response::read_from(op::FETCH_RESPONSE, &mut r).await.unwrap(),
            Response::Fetch(FetchResponse { status: 100, count: 0 })
        );
        assert_eq!(
            Response::read_from(op::SQL_RESPONSE, &mut r).await.unwrap(),
            Response::Sql(SqlResponse { count: 1 })
        );
        assert!(matches!(
            Response::read_from(op::DUMMY, &mut r).await,
            Err(Error::Protocol(_))
        ));
    }
}
