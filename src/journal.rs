//! Binary journal persistence.
//!
//! On-disk layout: `count: u64` little-endian, then `count` fixed-size
//! [`OrderMessage`] records back-to-back with no framing (the 26-byte
//! layout documented in [`crate::message`]). Little-endian on every host;
//! moving journals between hosts of different endianness is unsupported.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::message::{OrderMessage, MESSAGE_WIRE_SIZE};

// Reservation cap: the count field is untrusted until records parse
const MAX_PREALLOC_RECORDS: u64 = 1 << 20;

/// Write `count` + records. Any I/O failure surfaces as an error.
pub fn write_journal(path: &Path, messages: &[OrderMessage]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&(messages.len() as u64).to_le_bytes())?;
    for msg in messages {
        writer.write_all(&msg.encode())?;
    }
    writer.flush()
}

/// Read a journal back. Fails on a short read, a zero count, or a record
/// that does not decode; callers treat any failure as "journal unusable".
pub fn read_journal(path: &Path) -> io::Result<Vec<OrderMessage>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut count_buf = [0u8; 8];
    reader.read_exact(&mut count_buf)?;
    let count = u64::from_le_bytes(count_buf);
    if count == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "journal is empty"));
    }

    let mut messages = Vec::with_capacity(count.min(MAX_PREALLOC_RECORDS) as usize);
    let mut record = [0u8; MESSAGE_WIRE_SIZE];
    for _ in 0..count {
        reader.read_exact(&mut record)?;
        let msg = OrderMessage::decode(&record)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "corrupt journal record"))?;
        messages.push(msg);
    }

    Ok(messages)
}
