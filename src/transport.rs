use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

use crate::collector::Timeouts;

/// Byte-level access to the bus.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Non-blocking poll; `None` when no byte is currently available.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(10),
        }
    }
}

impl SerialConfig {
    /// Collector budgets with the frame gap matched to this line speed.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts::for_baud_rate(self.baud_rate)
    }
}

/// [`Transport`] over a serial device. The port is closed when dropped.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> Result<Self, serialport::Error> {
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .parity(config.parity)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.read_timeout)
            .open()?;
        debug!(port = %config.port, baud = config.baud_rate, "serial port opened");
        Ok(Self { port })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    pub fn port_name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }
}
