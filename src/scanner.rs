//! Comment block scanner.
//!
//! Splits source text into `/** ... */` block comments. Only the comment
//! delimiters are recognised; the host language around them is never parsed.
//!
//! A block is *tagged* when the token following the opening marker is
//! [`TAG`]:
//!
//! ```text
//! /** pshufb rep=4
//!     lookup = [i ^ 3 for i in range(16)]
//! */
//! ```
//!
//! The opening line is a header and is not part of the block body. Any
//! further header tokens are kept for [`crate::options::BlockOptions`].

use thiserror::Error;

pub const OPEN_MARKER: &str = "/**";
pub const CLOSE_MARKER: &str = "*/";
/// `/**/` is an empty comment and never opens a block.
pub const EMPTY_COMMENT: &str = "/**/";
pub const TAG: &str = "pshufb";

/// A block comment captured from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBlock {
    /// 1-based line of the opening marker.
    pub line: usize,
    pub tagged: bool,
    /// Header tokens following the tag. Empty for untagged blocks.
    pub header: Vec<String>,
    /// Body lines, with the closing marker and anything after it removed.
    pub lines: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("comment block opened at line {line} is not closed")]
    Unclosed { line: usize },
}

enum ScanState {
    Outside,
    Inside(CommentBlock),
}

/// Collect every block comment in `text`, tagged or not.
pub fn scan(text: &str) -> Result<Vec<CommentBlock>, ScanError> {
    let mut blocks = Vec::new();
    let mut state = ScanState::Outside;

    for (idx, line) in text.lines().enumerate() {
        state = match state {
            ScanState::Outside => match open_block(line, idx + 1) {
                Some((block, true)) => {
                    blocks.push(block);
                    ScanState::Outside
                }
                Some((block, false)) => ScanState::Inside(block),
                None => ScanState::Outside,
            },
            ScanState::Inside(mut block) => match line.find(CLOSE_MARKER) {
                Some(end) => {
                    block.lines.push(line[..end].to_string());
                    blocks.push(block);
                    ScanState::Outside
                }
                None => {
                    block.lines.push(line.to_string());
                    ScanState::Inside(block)
                }
            },
        };
    }

    match state {
        ScanState::Outside => Ok(blocks),
        ScanState::Inside(block) => Err(ScanError::Unclosed { line: block.line }),
    }
}

/// Collect the tagged blocks of `text`, in order.
pub fn tagged_blocks(text: &str) -> Result<Vec<CommentBlock>, ScanError> {
    let blocks = scan(text)?;
    let total = blocks.len();
    let tagged: Vec<_> = blocks.into_iter().filter(|b| b.tagged).collect();
    log::trace!("{} comment blocks, {} tagged", total, tagged.len());
    Ok(tagged)
}

/// Try to open a block on `line`. The flag is true when the block also
/// closes on the same line.
fn open_block(line: &str, line_no: usize) -> Option<(CommentBlock, bool)> {
    let start = line.find(OPEN_MARKER)?;
    let rest = &line[start..];
    if rest.starts_with(EMPTY_COMMENT) {
        return None;
    }

    let (header_text, closed) = match rest[OPEN_MARKER.len()..].find(CLOSE_MARKER) {
        Some(end) => (&rest[..OPEN_MARKER.len() + end], true),
        None => (rest, false),
    };

    let mut tokens = header_text.split_whitespace().skip(1);
    let tagged = tokens.next() == Some(TAG);
    let header = if tagged {
        tokens.map(str::to_string).collect()
    } else {
        Vec::new()
    };

    let block = CommentBlock {
        line: line_no,
        tagged,
        header,
        lines: Vec::new(),
    };
    Some((block, closed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_block() {
        let text = "int x;\n/** pshufb\n    t = [0] * 64\n*/\nint y;\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].tagged);
        assert_eq!(blocks[0].line, 2);
        assert_eq!(blocks[0].lines, vec!["    t = [0] * 64".to_string(), String::new()]);
    }

    #[test]
    fn test_untagged_blocks_are_filtered() {
        let text = "/** Documentation\n * more\n */\n/**\n*/\n/** other pshufb\n*/\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| !b.tagged));
        assert!(tagged_blocks(text).unwrap().is_empty());
    }

    #[test]
    fn test_empty_comment_does_not_open() {
        let text = "/**/ int x;\nt = [0] * 64\n";
        assert!(scan(text).unwrap().is_empty());
    }

    #[test]
    fn test_single_line_comment_closes() {
        let text = "/** brief */ int x;\n/********/\n/** pshufb */\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.lines.is_empty()));
        assert!(blocks[2].tagged);
    }

    #[test]
    fn test_closing_line_keeps_text_before_marker() {
        let text = "/** pshufb\nt = list(range(64)) */ int z;\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks[0].lines, vec!["t = list(range(64)) ".to_string()]);
    }

    #[test]
    fn test_header_tokens() {
        let text = "    /** pshufb rep=4 name=lookup\n    */\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks[0].header, vec!["rep=4", "name=lookup"]);
    }

    #[test]
    fn test_tag_is_counted_from_marker() {
        let text = "int x; /** pshufb rep=2\n*/\nstatic int pshufb; /** table\n*/\n/**pshufb\n*/\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].tagged);
        assert_eq!(blocks[0].header, vec!["rep=2"]);
        assert!(!blocks[1].tagged);
        assert!(!blocks[2].tagged);
    }

    #[test]
    fn test_unclosed_block() {
        let text = "x\n/** pshufb\nt = [0] * 64\n";
        assert_eq!(scan(text), Err(ScanError::Unclosed { line: 2 }));
    }

    #[test]
    fn test_unclosed_untagged_block() {
        let text = "/** notes\nstill open\n";
        assert_eq!(scan(text), Err(ScanError::Unclosed { line: 1 }));
    }

    #[test]
    fn test_markers_inside_block_are_not_reopened() {
        let text = "/** pshufb\n/** nested\nt = 1\n*/\n";
        let blocks = scan(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines.len(), 3);
    }
}
