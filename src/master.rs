use tracing::debug;

use super::*;
use crate::collector::{collect, Timeouts};
use crate::transport::{SerialConfig, SerialTransport, Transport};

/// Callback invoked at each step of an exchange.
pub type Observer = Box<dyn Fn(&ExchangeEvent<'_>) + Send + Sync>;

#[derive(Debug)]
pub enum ExchangeEvent<'a> {
    FrameBuilt(&'a [u8]),
    FrameSent(&'a [u8]),
    ResponseReceived(&'a [u8]),
    Decoded(Result<&'a DecodedValue, &'a ModbusMasterError>),
}

/// What to do after the request frame has been written.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Collect the response and decode it as raw hex bytes.
    #[default]
    Decode,
    /// Return as soon as the frame is written.
    NoWait,
    /// Collect the response and compare it with the sent frame.
    VerifyWrite,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    Decoded(DecodedValue),
    /// Frame written, no response awaited.
    Accepted,
    /// Whether the slave echoed the sent frame exactly.
    Verified(bool),
}

/// Modbus RTU master bound to one transport
pub struct ModbusMaster<T: Transport> {
    transport: T,
    debug: bool,
    timeouts: Timeouts,
    observer: Option<Observer>,
}

impl<T: Transport> ModbusMaster<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            debug: false,
            timeouts: Timeouts::default(),
            observer: None,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Build a request frame, send it and handle the reply according to `mode`.
    ///
    /// `count_or_data` is the coil/register count for function codes 1-4 and
    /// the value to write for 5-6. Invalid parameters are rejected before
    /// anything is written.
    pub fn send_query(
        &mut self,
        slave_address: u8,
        function_code: u8,
        register_address: &str,
        count_or_data: u16,
        mode: ResponseMode,
    ) -> Result<QueryOutcome, ModbusMasterError> {
        let request = QueryRequest::builder()
            .slave_address(slave_address)
            .function_code(function_code)
            .register_address(register_address)
            .count_or_data(count_or_data)
            .build();

        match request {
            Ok(request) => self.send_request(&request, mode),
            Err(e) => {
                if self.debug {
                    debug!(error = %e, "invalid request");
                }
                Err(e.into())
            }
        }
    }

    pub fn send_request(
        &mut self,
        request: &QueryRequest,
        mode: ResponseMode,
    ) -> Result<QueryOutcome, ModbusMasterError> {
        let frame = self.prepare(request);
        self.exchange(&frame, mode)
    }

    /// Send caller-framed bytes verbatim; the caller is responsible for the CRC.
    pub fn send_raw_query(
        &mut self,
        frame: &[u8],
        mode: ResponseMode,
    ) -> Result<QueryOutcome, ModbusMasterError> {
        self.exchange(frame, mode)
    }

    /// Send a write request (function code 5 or 6) and fail unless the slave
    /// echoes it back unchanged.
    pub fn write_verified(
        &mut self,
        slave_address: u8,
        function_code: u8,
        register_address: &str,
        value: u16,
    ) -> Result<(), ModbusMasterError> {
        let request = QueryRequest::builder()
            .slave_address(slave_address)
            .function_code(function_code)
            .register_address(register_address)
            .count_or_data(value)
            .build()?;
        if request.function_code().is_read() {
            return Err(RequestError::NotAWriteFunction(function_code).into());
        }

        let frame = self.prepare(&request);
        self.transmit(&frame)?;
        match self.verify_echo(&frame)? {
            None => Ok(()),
            Some(response) => Err(ModbusMasterError::WriteVerificationMismatch {
                sent: format_frame(&frame),
                received: format_frame(&response),
            }),
        }
    }

    /// Collect a response without sending anything and decode it.
    pub fn get_response(
        &mut self,
        format: ResponseFormat,
        offset_left: usize,
        offset_right: usize,
    ) -> Result<DecodedValue, ModbusMasterError> {
        let response = self.collect_response()?;
        let result = decode_response(&response, format, offset_left, offset_right);

        if self.debug {
            match &result {
                Ok(value) => debug!("data: {:?}", value),
                Err(e) => debug!(error = %e, "response rejected"),
            }
        }
        self.notify(&ExchangeEvent::Decoded(result.as_ref()));
        result
    }

    /// Collect a response and return it unvalidated.
    pub fn read_raw_response(&mut self) -> Result<Vec<u8>, ModbusMasterError> {
        self.collect_response()
    }

    fn exchange(&mut self, frame: &[u8], mode: ResponseMode) -> Result<QueryOutcome, ModbusMasterError> {
        self.transmit(frame)?;

        match mode {
            ResponseMode::VerifyWrite => self
                .verify_echo(frame)
                .map(|mismatch| QueryOutcome::Verified(mismatch.is_none())),
            ResponseMode::Decode => self
                .get_response(ResponseFormat::default(), 0, 0)
                .map(QueryOutcome::Decoded),
            ResponseMode::NoWait => Ok(QueryOutcome::Accepted),
        }
    }

    fn prepare(&self, request: &QueryRequest) -> Vec<u8> {
        let frame = build_frame(request);
        self.notify(&ExchangeEvent::FrameBuilt(&frame));
        frame
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), ModbusMasterError> {
        self.transport.write(frame)?;
        if self.debug {
            debug!("query sent: {}", format_frame(frame));
        }
        self.notify(&ExchangeEvent::FrameSent(frame));
        Ok(())
    }

    fn collect_response(&mut self) -> Result<Vec<u8>, ModbusMasterError> {
        let response = collect(&mut self.transport, &self.timeouts)?;
        if self.debug {
            debug!("response received: {}", format_frame(&response));
        }
        self.notify(&ExchangeEvent::ResponseReceived(&response));
        Ok(response)
    }

    /// Returns the echoed bytes when they differ from `sent`.
    fn verify_echo(&mut self, sent: &[u8]) -> Result<Option<Vec<u8>>, ModbusMasterError> {
        let response = self.collect_response()?;
        if response == sent {
            if self.debug {
                debug!("sent - received: match");
            }
            return Ok(None);
        }
        if self.debug {
            debug!(
                sent = %format_frame(sent),
                received = %format_frame(&response),
                "sent - received: no match"
            );
        }
        Ok(Some(response))
    }

    fn notify(&self, event: &ExchangeEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}

impl ModbusMaster<SerialTransport> {
    /// Open the serial device and match the collector's frame gap to its baud rate.
    pub fn open(config: &SerialConfig) -> Result<Self, ModbusMasterError> {
        let transport = SerialTransport::open(config)?;
        Ok(Self::new(transport).with_timeouts(config.timeouts()))
    }
}
