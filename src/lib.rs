// lib.rs

mod protocol;
mod modbus_rtu;
mod collector;
mod transport;
mod master;

pub use protocol::{DecodedValue, FunctionCode, ResponseFormat, convert_response, render_data};
pub use protocol::{QueryRequest, QueryRequestBuilder, RequestError};
pub use modbus_rtu::{build_frame, crc16, decode_response, extract_data, format_frame};
pub use collector::{Timeouts, collect, frame_gap_for};
pub use transport::{SerialConfig, SerialTransport, Transport};
pub use master::{ExchangeEvent, ModbusMaster, Observer, QueryOutcome, ResponseMode};

#[derive(Debug, thiserror::Error)]
pub enum ModbusMasterError {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("No response: {received} bytes received")]
    NoResponse { received: usize },

    #[error("No valid data in response")]
    NoValidData,

    #[error("CRC mismatch: expected {expected:#06x}, received {received:#06x}")]
    CrcMismatch { expected: u16, received: u16 },

    #[error("Write verification failed: sent {sent}, received {received}")]
    WriteVerificationMismatch { sent: String, received: String },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}
