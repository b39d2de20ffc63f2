use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid function code: {0}, expected 1..=6")]
    InvalidFunctionCode(u8),

    #[error("Invalid register address {0:?}, expected 4 hex digits")]
    InvalidRegisterAddress(String),

    #[error("Function code {0} is not a single write")]
    NotAWriteFunction(u8),

    #[error("Slave address is empty")]
    SlaveAddressMissing,

    #[error("Function code is empty")]
    FunctionCodeMissing,

    #[error("Register address is empty")]
    RegisterAddressMissing,

    #[error("Invalid hex token {0:?}")]
    InvalidHexToken(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
}

impl FunctionCode {
    /// Read functions carry a coil/register count, write functions carry the value itself.
    pub fn is_read(self) -> bool {
        !matches!(self, FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister)
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = RequestError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(FunctionCode::ReadCoils),
            0x02 => Ok(FunctionCode::ReadDiscreteInputs),
            0x03 => Ok(FunctionCode::ReadHoldingRegisters),
            0x04 => Ok(FunctionCode::ReadInputRegisters),
            0x05 => Ok(FunctionCode::WriteSingleCoil),
            0x06 => Ok(FunctionCode::WriteSingleRegister),
            _ => Err(RequestError::InvalidFunctionCode(code)),
        }
    }
}

/// A single validated request, ready to be framed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    slave_address: u8,
    function_code: FunctionCode,
    register_address: u16,
    count_or_data: u16,
}

pub struct QueryRequestBuilder {
    slave_address: Option<u8>,
    function_code: Option<u8>,
    register_address: Option<String>,
    count_or_data: Option<u16>,
}

impl QueryRequestBuilder {
    pub fn slave_address(mut self, slave_address: u8) -> Self {
        self.slave_address = Some(slave_address);
        self
    }

    pub fn function_code(mut self, function_code: u8) -> Self {
        self.function_code = Some(function_code);
        self
    }

    pub fn register_address(mut self, register_address: &str) -> Self {
        self.register_address = Some(register_address.to_string());
        self
    }

    /// Coil/register count for function codes 1-4, the value to write for 5-6.
    pub fn count_or_data(mut self, count_or_data: u16) -> Self {
        self.count_or_data = Some(count_or_data);
        self
    }

    pub fn build(self) -> Result<QueryRequest, RequestError> {
        let function_code = match self.function_code {
            Some(code) => FunctionCode::try_from(code)?,
            None => return Err(RequestError::FunctionCodeMissing),
        };
        let slave_address = match self.slave_address {
            Some(addr) => addr,
            None => return Err(RequestError::SlaveAddressMissing),
        };
        let register_address = match self.register_address {
            Some(addr) => parse_register_address(&addr)?,
            None => return Err(RequestError::RegisterAddressMissing),
        };
        let count_or_data = match self.count_or_data {
            Some(value) => value,
            None if function_code.is_read() => 1,
            None => 0,
        };
        Ok(
            QueryRequest {
                slave_address,
                function_code,
                register_address,
                count_or_data,
            }
        )
    }
}

fn parse_register_address(addr: &str) -> Result<u16, RequestError> {
    if addr.len() != 4 || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RequestError::InvalidRegisterAddress(addr.to_string()));
    }
    u16::from_str_radix(addr, 16).map_err(|_| RequestError::InvalidRegisterAddress(addr.to_string()))
}

impl QueryRequest {
    pub fn builder() -> QueryRequestBuilder {
        QueryRequestBuilder {
            slave_address: None,
            function_code: None,
            register_address: None,
            count_or_data: None,
        }
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn function_code(&self) -> FunctionCode {
        self.function_code
    }

    pub fn register_address(&self) -> u16 {
        self.register_address
    }

    pub fn count_or_data(&self) -> u16 {
        self.count_or_data
    }

    /// Function code, register address and count/data, without slave address and CRC.
    pub fn create_pdu(&self) -> Vec<u8> {
        let mut msg: [u8; 5] = [0; 5];
        msg[0] = self.function_code.code();
        msg[1] = (self.register_address >> 8) as u8;
        msg[2] = self.register_address as u8;
        msg[3] = (self.count_or_data >> 8) as u8;
        msg[4] = self.count_or_data as u8;
        Vec::from(msg) // all fields validated in builder
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Raw,
    Unsigned16,
    Signed16,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedValue {
    /// One lowercase two-digit hex string per data byte.
    Raw(Vec<String>),
    Unsigned(Vec<u16>),
    Signed(Vec<i16>),
    Text(String),
}

/// Render extracted payload bytes in the requested representation.
pub fn render_data(data: &[u8], format: ResponseFormat) -> DecodedValue {
    match format {
        ResponseFormat::Raw => DecodedValue::Raw(data.iter().map(|byte| format!("{:02x}", byte)).collect()),
        ResponseFormat::Unsigned16 => DecodedValue::Unsigned(words(data).collect()),
        ResponseFormat::Signed16 => DecodedValue::Signed(words(data).map(to_signed).collect()),
        ResponseFormat::Text => DecodedValue::Text(data.iter().map(|&byte| byte as char).collect()),
    }
}

/// Convert hex-pair tokens (as produced by [`ResponseFormat::Raw`]) into another representation.
pub fn convert_response<S: AsRef<str>>(tokens: &[S], format: ResponseFormat) -> Result<DecodedValue, RequestError> {
    let mut bytes = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() || token.len() > 2 {
            return Err(RequestError::InvalidHexToken(token.to_string()));
        }
        let byte = u8::from_str_radix(token, 16)
            .map_err(|_| RequestError::InvalidHexToken(token.to_string()))?;
        bytes.push(byte);
    }
    Ok(render_data(&bytes, format))
}

// Big-endian pairs; a trailing odd byte stands alone.
fn words(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks(2)
        .map(|chunk| chunk.iter().fold(0u16, |word, &byte| (word << 8) | byte as u16))
}

fn to_signed(value: u16) -> i16 {
    if value > 32767 {
        (value as i32 - 65536) as i16
    } else {
        value as i16
    }
}
