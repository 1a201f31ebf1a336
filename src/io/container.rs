//! On-disk snapshot container.
//!
//! Layout: a bincode-encoded [`Header`] (magic tag + format version)
//! followed by the bincode-encoded [`Snapshot`].

use super::snapshot::Snapshot;
use crate::amr_error::AmrReduceError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: [u8; 8] = *b"AMRSNAP\0";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 8],
    version: u32,
}

/// Encode `snapshot` into `writer`.
pub fn write_to<W: Write>(mut writer: W, snapshot: &Snapshot) -> Result<(), AmrReduceError> {
    let header = Header {
        magic: MAGIC,
        version: FORMAT_VERSION,
    };
    bincode::serialize_into(&mut writer, &header)?;
    bincode::serialize_into(&mut writer, snapshot)?;
    writer.flush()?;
    Ok(())
}

/// Decode a snapshot from `reader`, rejecting foreign or newer containers.
pub fn read_from<R: Read>(mut reader: R) -> Result<Snapshot, AmrReduceError> {
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.magic != MAGIC {
        return Err(AmrReduceError::Codec("not a snapshot container".into()));
    }
    if header.version != FORMAT_VERSION {
        return Err(AmrReduceError::Codec(format!(
            "unsupported container version {} (expected {FORMAT_VERSION})",
            header.version
        )));
    }
    Ok(bincode::deserialize_from(&mut reader)?)
}

pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &Snapshot) -> Result<(), AmrReduceError> {
    let file = File::create(path)?;
    write_to(BufWriter::new(file), snapshot)
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot, AmrReduceError> {
    let file = File::open(path)?;
    read_from(BufReader::new(file))
}
