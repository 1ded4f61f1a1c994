#![forbid(unsafe_code)]

//! Goto binary files: a 4-byte magic followed by the bincode encoding of the
//! program. Reading re-validates every node and every jump target.

use std::io::{Read, Write};

use crate::{GotoError, GotoProgram};

pub const GOTO_BINARY_MAGIC: [u8; 4] = *b"GBF\x01";

pub fn write_goto_binary(program: &GotoProgram, mut out: impl Write) -> Result<(), GotoError> {
    out.write_all(&GOTO_BINARY_MAGIC)?;
    bincode::serialize_into(&mut out, program)?;
    out.flush()?;
    Ok(())
}

pub fn read_goto_binary(mut input: impl Read) -> Result<GotoProgram, GotoError> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if magic != GOTO_BINARY_MAGIC {
        return Err(GotoError::BadMagic { found: magic });
    }
    let program: GotoProgram = bincode::deserialize_from(input)?;
    program.validate()?;
    tracing::debug!(
        functions = program.functions.len(),
        entry = %program.entry,
        "read goto binary"
    );
    Ok(program)
}

pub fn to_bytes(program: &GotoProgram) -> Result<Vec<u8>, GotoError> {
    let mut buf = Vec::new();
    write_goto_binary(program, &mut buf)?;
    Ok(buf)
}

pub fn from_bytes(bytes: &[u8]) -> Result<GotoProgram, GotoError> {
    read_goto_binary(bytes)
}
