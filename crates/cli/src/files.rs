use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use fastcsum::{InternetChecksum, Kernel};
use serde::Serialize;

/// Operand naming standard input.
pub const STDIN_OPERAND: &str = "-";

/// Checksum of one operand.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FileChecksum {
    /// Operand as given on the command line.
    pub path: String,
    /// Bytes read.
    pub bytes: u64,
    /// Checksum as it appears on the wire, printed as four hex digits.
    pub checksum: String,
}

/// The checksum value as a big-endian header field would hold it.
#[must_use]
pub const fn wire_value(checksum: u16) -> u16 {
    u16::from_be_bytes(checksum.to_ne_bytes())
}

/// Checksums everything `reader` yields.
pub fn checksum_reader<R: Read + ?Sized>(reader: &mut R, kernel: Kernel) -> io::Result<(u64, u16)> {
    let mut hasher = InternetChecksum::with_kernel(kernel).map_err(io::Error::other)?;
    let bytes = hasher.update_reader(&mut &mut *reader)?;
    Ok((bytes, hasher.finish()))
}

/// Checksums the file (or standard input) named by `operand`.
pub fn checksum_operand<R: Read + ?Sized>(
    operand: &OsStr,
    stdin: &mut R,
    kernel: Kernel,
) -> io::Result<FileChecksum> {
    let (bytes, checksum) = if operand == STDIN_OPERAND {
        checksum_reader(stdin, kernel)?
    } else {
        let mut file = File::open(Path::new(operand))?;
        checksum_reader(&mut file, kernel)?
    };
    Ok(FileChecksum {
        path: operand.to_string_lossy().into_owned(),
        bytes,
        checksum: format!("{:04x}", wire_value(checksum)),
    })
}
