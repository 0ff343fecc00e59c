// This module drives a generator run. For every input path it reads the file, scans it for
// tagged comment blocks, evaluates each block's snippet, selects the table to emit and renders
// it with the configured TableFormat. A file's declarations are collected in a string buffer and
// written to the output stream only once every block of that file succeeded, so a file that
// fails never leaves a partial listing behind. The run stops at the first error; files that
// completed earlier keep their output.

//! Table generation pipeline.

use std::fs;
use std::io;
use std::path::Path;

use crate::emit::{pattern_len, TableFormat};
use crate::error::{GenError, GenResult};
use crate::options::BlockOptions;
use crate::scanner::{self, CommentBlock, ScanError};
use crate::snippet;

/// Turns annotated source files into table declarations.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    pub format: TableFormat,
}

impl Generator {
    pub fn new(format: TableFormat) -> Self {
        Self { format }
    }

    /// Generate the listing for one file's contents.
    ///
    /// `path` is used for the `// <path>` header and error messages only.
    /// Returns an empty string when the text has no tagged blocks.
    pub fn generate_source(&self, path: &str, text: &str) -> GenResult<String> {
        let blocks = scanner::tagged_blocks(text).map_err(|e| match e {
            ScanError::Unclosed { line } => GenError::UnclosedComment {
                path: path.to_string(),
                line,
            },
        })?;
        log::debug!("{}: {} tagged blocks", path, blocks.len());

        let mut out = String::new();
        if blocks.is_empty() {
            return Ok(out);
        }

        out.push_str("// ");
        out.push_str(path);
        out.push('\n');
        for block in &blocks {
            self.generate_block(path, block, &mut out)?;
        }
        Ok(out)
    }

    fn generate_block(&self, path: &str, block: &CommentBlock, out: &mut String) -> GenResult<()> {
        let line = block.line;
        log::debug!("{}:{}: evaluating {} lines", path, line, block.lines.len());

        let options = BlockOptions::parse(&block.header).map_err(|source| GenError::InvalidOption {
            path: path.to_string(),
            line,
            source,
        })?;
        let tiling = |source| GenError::Tiling {
            path: path.to_string(),
            line,
            source,
        };
        let len = pattern_len(options.rep).map_err(tiling)?;

        // Body lines start right after the opening line.
        let namespace = snippet::evaluate(&block.lines, line + 1).map_err(|source| {
            GenError::Evaluation {
                path: path.to_string(),
                line,
                source,
            }
        })?;
        let (name, pattern) = snippet::select(&namespace, options.name.as_deref(), len)
            .map_err(|source| GenError::Qualification {
                path: path.to_string(),
                line,
                source,
            })?;

        self.format
            .write_table(out, name, &pattern, options.rep)
            .map_err(tiling)?;
        log::info!("{}:{}: emitted `{}` (rep={})", path, line, name, options.rep);
        Ok(())
    }

    /// Read and generate one file.
    pub fn generate_file(&self, path: &Path) -> GenResult<String> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| GenError::Read {
            path: display.clone(),
            source,
        })?;
        self.generate_source(&display, &text)
    }

    /// Process `paths` in order, writing each file's listing to `out`.
    ///
    /// Stops at the first failing file. Nothing of that file is written.
    pub fn run<P, W>(&self, paths: &[P], out: &mut W) -> GenResult<()>
    where
        P: AsRef<Path>,
        W: io::Write,
    {
        for path in paths {
            let listing = self.generate_file(path.as_ref())?;
            out.write_all(listing.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

/// Run the generator with the default table format.
pub fn run<P, W>(paths: &[P], out: &mut W) -> GenResult<()>
where
    P: AsRef<Path>,
    W: io::Write,
{
    Generator::default().run(paths, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = "\
int x;
/** pshufb
    table = [i for i in range(64)]
*/
";

    #[test]
    fn test_header_and_table() {
        let text = Generator::default().generate_source("a.c", IDENTITY).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "// a.c");
        assert_eq!(lines[1], "const __m512i table = _mm512_setr_epi64(");
        assert_eq!(lines[2], "    0x0706050403020100,");
        assert_eq!(lines.len(), 11);
    }

    #[test]
    fn test_no_tagged_blocks() {
        let text = "/** plain doc comment\n * x = [0] * 64\n */\n/**/ int y;\n";
        assert_eq!(Generator::default().generate_source("b.c", text).unwrap(), "");
    }

    #[test]
    fn test_error_context() {
        let text = "\n\n/** pshufb\n  t = [0] * 63\n*/\n";
        let err = Generator::default().generate_source("c.c", text).unwrap_err();
        assert!(matches!(err, GenError::Qualification { line: 3, .. }), "{err}");
        assert_eq!(err.to_string(), "c.c:3: the program does not define any 64-value array");
    }

    #[test]
    fn test_evaluation_error_line() {
        let text = "/** pshufb\n  a = 1\n  t = a // 0\n*/\n";
        match Generator::default().generate_source("d.c", text) {
            Err(GenError::Evaluation { line, source, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(source.line(), 3);
            }
            other => panic!("expected an evaluation error, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_format() {
        let format = TableFormat {
            indent: "\t".to_string(),
            ..TableFormat::default()
        };
        let text = Generator::new(format).generate_source("e.c", IDENTITY).unwrap();
        assert!(text.contains("\n\t0x0f0e0d0c0b0a0908,\n"));
    }
}
