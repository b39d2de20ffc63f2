use super::*;

/// Smallest response that may carry data: address, function, byte count and CRC.
const MIN_RESPONSE_LEN: usize = 5;

/// Modbus CRC-16 over `data`, low byte first as it appears on the wire.
pub fn crc16(data: &[u8]) -> [u8; 2] {
    calculate_crc(data).to_le_bytes()
}

fn calculate_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Generate complete RTU frame for a request
pub fn build_frame(request: &QueryRequest) -> Vec<u8> {
    wrap_rtu(request.slave_address(), request.create_pdu())
}

fn wrap_rtu(slave_address: u8, pdu: Vec<u8>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + pdu.len() + 2);
    frame.push(slave_address);
    frame.extend(&pdu);

    let crc = crc16(&frame);
    frame.extend_from_slice(&crc);

    frame
}

/// Validate a collected response and return the data bytes between the byte
/// count field and the CRC, trimmed by the given offsets.
///
/// A byte count pointing past the end of the frame is clamped to the bytes
/// actually present.
pub fn extract_data(
    frame: &[u8],
    offset_left: usize,
    offset_right: usize,
) -> Result<&[u8], ModbusMasterError> {
    if frame.len() < MIN_RESPONSE_LEN {
        return Err(ModbusMasterError::NoResponse { received: frame.len() });
    }
    if frame.len() == MIN_RESPONSE_LEN {
        return Err(ModbusMasterError::NoValidData);
    }

    let (body, received) = frame.split_at(frame.len() - 2);
    let expected = crc16(body);
    if expected[..] != received[..] {
        return Err(ModbusMasterError::CrcMismatch {
            expected: u16::from_le_bytes(expected),
            received: u16::from_le_bytes([received[0], received[1]]),
        });
    }

    let byte_count = body[2] as usize;
    let end = (3 + byte_count).saturating_sub(offset_right).min(body.len());
    let start = 3usize.saturating_add(offset_left).min(end);

    Ok(&body[start..end])
}

/// Validate and decode a response frame in one step.
pub fn decode_response(
    frame: &[u8],
    format: ResponseFormat,
    offset_left: usize,
    offset_right: usize,
) -> Result<DecodedValue, ModbusMasterError> {
    let data = extract_data(frame, offset_left, offset_right)?;
    Ok(render_data(data, format))
}

/// Render bytes as `\x01\x04\x31` for diagnostics.
pub fn format_frame(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("\\x{:02x}", byte)).collect()
}
