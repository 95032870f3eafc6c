//! Binary container format (Section 4.9).
//!
//! ```text
//! magic       "DELTA"           5 bytes
//! version     u8                1 byte   (currently 1)
//! mode        u8                1 byte   (0 = sequential, 1 = in-place)
//! version_len varint             target length |V|
//! count       varint             number of commands
//! commands... tag + fields      see below
//! crc         u64 BE            CRC-64/XZ over every preceding byte
//! ```
//!
//! Command encoding (sequential mode uses [`Command`], in-place mode uses
//! [`PlacedCommand`]):
//!
//! | tag  | meaning            | fields                       |
//! |------|--------------------|------------------------------|
//! | 0x01 | COPY (sequential)  | varint offset, varint length |
//! | 0x02 | ADD (sequential)   | varint length, raw bytes     |
//! | 0x11 | COPY (in-place)    | varint src, varint dst, varint length |
//! | 0x12 | ADD (in-place)     | varint dst, varint length, raw bytes |
//!
//! Integers use unsigned LEB128 varints (7 data bits per byte, MSB set on
//! all but the last byte of a value).

use crc::{Crc, CRC_64_XZ};

use crate::types::{
    Command, DeltaError, PlacedCommand, CRC_LEN, DELTA_MAGIC, DELTA_VERSION, MODE_INPLACE,
    MODE_SEQUENTIAL, TAG_ADD, TAG_ADD_PLACED, TAG_COPY, TAG_COPY_PLACED,
};

const CHECKSUM: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, DeltaError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| DeltaError::FormatError("truncated varint".into()))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(DeltaError::FormatError("varint too long".into()));
        }
    }
    Ok(result)
}

fn read_bytes<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], DeltaError> {
    let end = pos
        .checked_add(len)
        .ok_or_else(|| DeltaError::FormatError("length overflow".into()))?;
    let slice = data
        .get(*pos..end)
        .ok_or_else(|| DeltaError::FormatError("truncated payload".into()))?;
    *pos = end;
    Ok(slice)
}

/// Encode a sequential delta (Section 4.9, mode = sequential).
pub fn encode_delta(version_len: usize, commands: &[Command]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(DELTA_MAGIC);
    out.push(DELTA_VERSION);
    out.push(MODE_SEQUENTIAL);
    write_varint(&mut out, version_len as u64);
    write_varint(&mut out, commands.len() as u64);

    for cmd in commands {
        match cmd {
            Command::Copy { offset, length } => {
                out.push(TAG_COPY);
                write_varint(&mut out, *offset as u64);
                write_varint(&mut out, *length as u64);
            }
            Command::Add { data } => {
                out.push(TAG_ADD);
                write_varint(&mut out, data.len() as u64);
                out.extend_from_slice(data);
            }
        }
    }

    let checksum = CHECKSUM.checksum(&out);
    out.extend_from_slice(&checksum.to_be_bytes());
    out
}

/// Encode an in-place delta (Section 4.9, mode = in-place).
pub fn encode_delta_inplace(version_len: usize, commands: &[PlacedCommand]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(DELTA_MAGIC);
    out.push(DELTA_VERSION);
    out.push(MODE_INPLACE);
    write_varint(&mut out, version_len as u64);
    write_varint(&mut out, commands.len() as u64);

    for cmd in commands {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                out.push(TAG_COPY_PLACED);
                write_varint(&mut out, *src as u64);
                write_varint(&mut out, *dst as u64);
                write_varint(&mut out, *length as u64);
            }
            PlacedCommand::Add { dst, data } => {
                out.push(TAG_ADD_PLACED);
                write_varint(&mut out, *dst as u64);
                write_varint(&mut out, data.len() as u64);
                out.extend_from_slice(data);
            }
        }
    }

    let checksum = CHECKSUM.checksum(&out);
    out.extend_from_slice(&checksum.to_be_bytes());
    out
}

/// Whether a byte stream at least starts with a delta magic and is long
/// enough to report its mode without a full parse.
pub fn is_inplace_delta(data: &[u8]) -> Result<bool, DeltaError> {
    if data.len() < DELTA_MAGIC.len() + 2 {
        return Err(DeltaError::FormatError("too short to contain a header".into()));
    }
    if &data[..DELTA_MAGIC.len()] != DELTA_MAGIC {
        return Err(DeltaError::FormatError("bad magic".into()));
    }
    Ok(data[DELTA_MAGIC.len() + 1] == MODE_INPLACE)
}

/// Decoded delta: either a sequential command list or a placed in-place one.
#[derive(Debug)]
pub enum DecodedDelta {
    Sequential { version_len: usize, commands: Vec<Command> },
    Inplace { version_len: usize, commands: Vec<PlacedCommand> },
}

/// Decode and verify a delta container (Section 4.9).
///
/// Verifies magic, version, CRC-64/XZ, and structural consistency (declared
/// command count matches what was actually parsed) before returning.
pub fn decode_delta(data: &[u8]) -> Result<DecodedDelta, DeltaError> {
    if data.len() < DELTA_MAGIC.len() + 2 + CRC_LEN {
        return Err(DeltaError::FormatError("too short to contain a header and trailer".into()));
    }

    let body_len = data.len() - CRC_LEN;
    let (body, trailer) = data.split_at(body_len);
    let stored_crc = u64::from_be_bytes(trailer.try_into().unwrap());
    let computed_crc = CHECKSUM.checksum(body);
    if stored_crc != computed_crc {
        return Err(DeltaError::ChecksumMismatch);
    }

    let mut pos = 0;
    if &body[..DELTA_MAGIC.len()] != DELTA_MAGIC {
        return Err(DeltaError::FormatError("bad magic".into()));
    }
    pos += DELTA_MAGIC.len();

    let version = body[pos];
    pos += 1;
    if version != DELTA_VERSION {
        return Err(DeltaError::FormatError(format!("unsupported version {version}")));
    }

    let mode = body[pos];
    pos += 1;

    let version_len = read_varint(body, &mut pos)? as usize;
    let count = read_varint(body, &mut pos)? as usize;

    match mode {
        MODE_SEQUENTIAL => {
            let mut commands = Vec::with_capacity(count);
            for _ in 0..count {
                let tag = *body
                    .get(pos)
                    .ok_or_else(|| DeltaError::FormatError("truncated command stream".into()))?;
                pos += 1;
                match tag {
                    TAG_COPY => {
                        let offset = read_varint(body, &mut pos)? as usize;
                        let length = read_varint(body, &mut pos)? as usize;
                        commands.push(Command::Copy { offset, length });
                    }
                    TAG_ADD => {
                        let length = read_varint(body, &mut pos)? as usize;
                        let data = read_bytes(body, &mut pos, length)?.to_vec();
                        commands.push(Command::Add { data });
                    }
                    other => {
                        return Err(DeltaError::FormatError(format!("unknown sequential tag 0x{other:02x}")));
                    }
                }
            }
            if pos != body.len() {
                return Err(DeltaError::FormatError("trailing bytes after commands".into()));
            }
            Ok(DecodedDelta::Sequential { version_len, commands })
        }
        MODE_INPLACE => {
            let mut commands = Vec::with_capacity(count);
            for _ in 0..count {
                let tag = *body
                    .get(pos)
                    .ok_or_else(|| DeltaError::FormatError("truncated command stream".into()))?;
                pos += 1;
                match tag {
                    TAG_COPY_PLACED => {
                        let src = read_varint(body, &mut pos)? as usize;
                        let dst = read_varint(body, &mut pos)? as usize;
                        let length = read_varint(body, &mut pos)? as usize;
                        commands.push(PlacedCommand::Copy { src, dst, length });
                    }
                    TAG_ADD_PLACED => {
                        let dst = read_varint(body, &mut pos)? as usize;
                        let length = read_varint(body, &mut pos)? as usize;
                        let data = read_bytes(body, &mut pos, length)?.to_vec();
                        commands.push(PlacedCommand::Add { dst, data });
                    }
                    other => {
                        return Err(DeltaError::FormatError(format!("unknown in-place tag 0x{other:02x}")));
                    }
                }
            }
            if pos != body.len() {
                return Err(DeltaError::FormatError("trailing bytes after commands".into()));
            }
            Ok(DecodedDelta::Inplace { version_len, commands })
        }
        other => Err(DeltaError::FormatError(format!("unknown mode byte 0x{other:02x}"))),
    }
}
