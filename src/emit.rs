// This module renders a 64-byte table as an AVX-512 constant declaration. The bytes are split
// into eight consecutive quad-words; each quad-word is printed as a little-endian 64-bit hex
// literal, so the first byte of a group becomes the lowest-order byte of the literal. The
// literals are passed in array order to `_mm512_setr_epi64`, which places its first argument
// in the lowest lane, so loading the constant reproduces the original byte order in memory.
// Shorter patterns are tiled with a repeat factor before rendering.

//! AVX-512 table emitter.

use std::fmt::Write;

use thiserror::Error;

/// Size of a 512-bit vector in bytes.
pub const TABLE_BYTES: usize = 64;
pub const QWORDS: usize = TABLE_BYTES / 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("repeat factor {rep} does not divide 64")]
    RepeatFactor { rep: usize },

    #[error("{len} bytes repeated {rep} times do not make 64 bytes")]
    Tiling { len: usize, rep: usize },

    #[error("formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// Literal spelling of the emitted declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub vector_type: String,
    pub constructor: String,
    pub indent: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            vector_type: "__m512i".to_string(),
            constructor: "_mm512_setr_epi64".to_string(),
            indent: "    ".to_string(),
        }
    }
}

/// Length of the pattern that fills a table when repeated `rep` times.
pub fn pattern_len(rep: usize) -> Result<usize, EmitError> {
    if rep == 0 || TABLE_BYTES % rep != 0 {
        return Err(EmitError::RepeatFactor { rep });
    }
    Ok(TABLE_BYTES / rep)
}

/// Tile `pattern` `rep` times and pack it into little-endian quad-words.
pub fn qwords(pattern: &[u8], rep: usize) -> Result<[u64; QWORDS], EmitError> {
    if pattern.len().checked_mul(rep) != Some(TABLE_BYTES) {
        return Err(EmitError::Tiling {
            len: pattern.len(),
            rep,
        });
    }

    let bytes: Vec<u8> = pattern.repeat(rep);
    let mut words = [0u64; QWORDS];
    for (word, group) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut le = [0u8; 8];
        le.copy_from_slice(group);
        *word = u64::from_le_bytes(le);
    }
    Ok(words)
}

impl TableFormat {
    /// Append the declaration of `name` to `out`.
    pub fn write_table<W: Write>(
        &self,
        out: &mut W,
        name: &str,
        pattern: &[u8],
        rep: usize,
    ) -> Result<(), EmitError> {
        let words = qwords(pattern, rep)?;

        writeln!(out, "const {} {} = {}(", self.vector_type, name, self.constructor)?;
        for (i, word) in words.iter().enumerate() {
            let sep = if i + 1 < QWORDS { "," } else { "" };
            writeln!(out, "{}0x{:016x}{}", self.indent, word, sep)?;
        }
        writeln!(out, ");")?;
        Ok(())
    }

    pub fn render(&self, name: &str, pattern: &[u8], rep: usize) -> Result<String, EmitError> {
        let mut out = String::new();
        self.write_table(&mut out, name, pattern, rep)?;
        Ok(out)
    }
}
