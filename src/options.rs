//! Per-block options taken from the header line of a tagged comment.
//!
//! `/** pshufb rep=4 name=lookup` tiles the 16-byte `lookup` array four
//! times. Tokens without `=` are free text and are ignored.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option `{0}`")]
    Unknown(String),

    #[error("`rep` expects a positive integer, got `{0}`")]
    InvalidRepeat(String),

    #[error("`name` expects an identifier, got `{0}`")]
    InvalidName(String),

    #[error("option `{0}` given twice")]
    Duplicate(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOptions {
    /// How many times the selected array is repeated to fill 64 bytes.
    pub rep: usize,
    /// Binding to emit. `None` selects the first qualifying array.
    pub name: Option<String>,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self { rep: 1, name: None }
    }
}

impl BlockOptions {
    pub fn parse<S: AsRef<str>>(header: &[S]) -> Result<Self, OptionError> {
        let mut options = BlockOptions::default();
        let mut seen_rep = false;

        for token in header.iter().map(AsRef::as_ref) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };

            match key {
                "rep" => {
                    if seen_rep {
                        return Err(OptionError::Duplicate("rep"));
                    }
                    seen_rep = true;
                    options.rep = match value.parse::<usize>() {
                        Ok(rep) if rep > 0 => rep,
                        _ => return Err(OptionError::InvalidRepeat(value.to_string())),
                    };
                }
                "name" => {
                    if options.name.is_some() {
                        return Err(OptionError::Duplicate("name"));
                    }
                    if !is_identifier(value) {
                        return Err(OptionError::InvalidName(value.to_string()));
                    }
                    options.name = Some(value.to_string());
                }
                _ => return Err(OptionError::Unknown(token.to_string())),
            }
        }

        Ok(options)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BlockOptions::parse::<&str>(&[]).unwrap();
        assert_eq!(options, BlockOptions { rep: 1, name: None });
    }

    #[test]
    fn test_free_text_is_ignored() {
        let options = BlockOptions::parse(&["expand", "utf8", "rep=2"]).unwrap();
        assert_eq!(options.rep, 2);
    }

    #[test]
    fn test_name() {
        let options = BlockOptions::parse(&["name=shuf_lo"]).unwrap();
        assert_eq!(options.name.as_deref(), Some("shuf_lo"));
        assert_eq!(
            BlockOptions::parse(&["name=1x"]),
            Err(OptionError::InvalidName("1x".to_string()))
        );
    }

    #[test]
    fn test_invalid_rep() {
        for bad in ["rep=0", "rep=-1", "rep=four", "rep="] {
            assert!(matches!(
                BlockOptions::parse(&[bad]),
                Err(OptionError::InvalidRepeat(_))
            ));
        }
        assert_eq!(
            BlockOptions::parse(&["rep=2", "rep=4"]),
            Err(OptionError::Duplicate("rep"))
        );
    }

    #[test]
    fn test_unknown_option() {
        assert_eq!(
            BlockOptions::parse(&["width=256"]),
            Err(OptionError::Unknown("width=256".to_string()))
        );
    }
}
