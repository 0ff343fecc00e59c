//! pshufb-const - AVX-512 byte table generator.
//!
//! Scans source files for block comments tagged `pshufb`, runs the small
//! array-building snippet inside each one and prints the resulting 64-byte
//! table as an `__m512i` constant built with `_mm512_setr_epi64`.
//!
//! # Primary Usage
//!
//! ```
//! use pshufb_const::Generator;
//!
//! let source = "/** pshufb\n    table = [i for i in range(64)]\n*/\n";
//! let listing = Generator::default().generate_source("table.c", source)?;
//! assert!(listing.starts_with("// table.c\nconst __m512i table = _mm512_setr_epi64(\n"));
//! # Ok::<(), pshufb_const::GenError>(())
//! ```
//!
//! # Architecture
//!
//! - [`scanner`] - Block comment extraction
//! - [`options`] - Header options of a tagged block (`rep=`, `name=`)
//! - [`snippet`] - Lexer, parser and interpreter for table snippets
//! - [`emit`] - Quad-word packing and declaration rendering
//! - [`generator`] - Per-file pipeline and the batch driver

pub mod emit;
pub mod error;
pub mod generator;
pub mod options;
pub mod scanner;
pub mod snippet;

pub use emit::{qwords, EmitError, TableFormat};
pub use error::{GenError, GenResult};
pub use generator::{run, Generator};
pub use options::{BlockOptions, OptionError};
pub use scanner::{CommentBlock, ScanError};
pub use snippet::{Namespace, SelectError, SnippetError, Value};
