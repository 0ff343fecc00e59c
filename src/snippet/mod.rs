//! Table snippets: a tiny array-building language embedded in comments.
//!
//! A snippet is a handful of Python-flavoured statements whose only job is
//! to build lists of small integers:
//!
//! ```text
//! # swap the bytes of every 32-bit lane
//! lanes = [4 * (i // 4) + 3 - i % 4 for i in range(64)]
//!
//! spread = []
//! for i in range(16):
//!     spread += [i, 0x80, 0x80, 0x80]
//! ```
//!
//! Supported: assignments (plain, indexed and augmented), `for` loops,
//! `if`/`elif`/`else`, list displays and comprehensions, integer arithmetic
//! and bit operations, comparisons, slicing, and the builtins `range`, `len`,
//! `list`, `reversed`, `sorted`, `sum`, `min`, `max` and `abs`. Anything else
//! (functions, imports, `while`, strings, floats) is rejected with
//! [`SnippetError::Unsupported`].
//!
//! Source nesting is limited to [`parser::MAX_NESTING`] levels, and the
//! work a snippet may do to [`interpreter::MAX_STEPS`] steps.
//!
//! Each snippet runs in a fresh [`Namespace`]. Bindings keep the order in
//! which names were first assigned, which is the order [`select`] scans.

use indexmap::IndexMap;
use thiserror::Error;

pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interpreter::Interpreter;
pub use value::Value;

/// Bindings left behind by a snippet, in first-assignment order.
pub type Namespace = IndexMap<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnippetError {
    #[error("line {line}: syntax error: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {what} is not supported in table snippets")]
    Unsupported { line: usize, what: String },

    #[error("line {line}: {message}")]
    Runtime { line: usize, message: String },
}

impl SnippetError {
    pub fn line(&self) -> usize {
        match self {
            SnippetError::Syntax { line, .. }
            | SnippetError::Unsupported { line, .. }
            | SnippetError::Runtime { line, .. } => *line,
        }
    }
}

/// Why no table could be taken from a namespace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("the program does not define any {len}-value array")]
    NoArray { len: usize },

    #[error("the program does not define `{name}`")]
    Undefined { name: String },

    #[error("`{name}` is {kind}, not an array")]
    NotAnArray { name: String, kind: &'static str },

    #[error("`{name}` has {actual} values, expected {expected}")]
    WrongLength {
        name: String,
        actual: usize,
        expected: usize,
    },

    #[error("`{name}[{index}]` is {value}, not a byte")]
    NotByte {
        name: String,
        index: usize,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { target: Target, value: Expr, line: usize },
    AugAssign { target: Target, op: BinOp, value: Expr, line: usize },
    For { var: String, iter: Expr, body: Vec<Stmt>, line: usize },
    If { branches: Vec<(Expr, Vec<Stmt>)>, orelse: Vec<Stmt>, line: usize },
    Expr { expr: Expr, line: usize },
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    /// `name[index]`
    Item(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Name(String),
    List(Vec<Expr>),
    ListComp {
        element: Box<Expr>,
        clauses: Vec<CompClause>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b <= c`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    Method {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Index(Box<Expr>, Box<Expr>),
    Slice {
        target: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompClause {
    For { var: String, iter: Expr },
    If(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
        }
    }

    /// Operator for an augmented assignment token such as `+=`.
    pub fn from_augmented(token: &str) -> Option<BinOp> {
        Some(match token {
            "+=" => BinOp::Add,
            "-=" => BinOp::Sub,
            "*=" => BinOp::Mul,
            "//=" => BinOp::FloorDiv,
            "%=" => BinOp::Mod,
            "**=" => BinOp::Pow,
            "<<=" => BinOp::Shl,
            ">>=" => BinOp::Shr,
            "&=" => BinOp::BitAnd,
            "|=" => BinOp::BitOr,
            "^=" => BinOp::BitXor,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Strip the indentation common to all non-blank lines, and all trailing
/// whitespace.
pub fn unindent<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let trimmed: Vec<&str> = lines.iter().map(|l| l.as_ref().trim_end()).collect();
    let width = trimmed
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    trimmed
        .iter()
        .map(|l| l.chars().skip(width).collect())
        .collect()
}

/// Run a snippet whose first line is line `first_line` of its file.
pub fn evaluate<S: AsRef<str>>(lines: &[S], first_line: usize) -> Result<Namespace, SnippetError> {
    let source = unindent(lines);
    let tokens = lexer::tokenize(&source, first_line)?;
    let program = parser::parse(&tokens)?;
    log::trace!("parsed {} statements", program.len());
    Interpreter::new().run(&program)
}

/// Pick the table to emit.
///
/// With `name`, that binding must hold exactly `len` values. Without it the
/// first binding holding a list of `len` values wins. The chosen list must
/// contain only integers in `0..=255`.
pub fn select<'a>(
    namespace: &'a Namespace,
    name: Option<&str>,
    len: usize,
) -> Result<(&'a str, Vec<u8>), SelectError> {
    let (name, items) = match name {
        Some(name) => {
            let (name, value) = namespace
                .get_key_value(name)
                .ok_or_else(|| SelectError::Undefined { name: name.to_string() })?;
            let items = value.as_list().ok_or_else(|| SelectError::NotAnArray {
                name: name.clone(),
                kind: value.type_name(),
            })?;
            if items.len() != len {
                return Err(SelectError::WrongLength {
                    name: name.clone(),
                    actual: items.len(),
                    expected: len,
                });
            }
            (name, items)
        }
        None => namespace
            .iter()
            .find_map(|(name, value)| {
                value
                    .as_list()
                    .filter(|items| items.len() == len)
                    .map(|items| (name, items))
            })
            .ok_or(SelectError::NoArray { len })?,
    };

    let bytes = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_int()
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(|| SelectError::NotByte {
                    name: name.clone(),
                    index,
                    value: item.to_string(),
                })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok((name.as_str(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Namespace {
        let lines: Vec<&str> = source.lines().collect();
        evaluate(&lines, 1).unwrap_or_else(|e| panic!("snippet failed: {e}"))
    }

    #[test]
    fn test_unindent() {
        let lines = ["        a = [", "            1,", "", "        ]   ", "\t"];
        assert_eq!(unindent(&lines), vec!["a = [", "    1,", "", "]", ""]);
    }

    #[test]
    fn test_unindent_all_blank() {
        assert_eq!(unindent(&["", "   "]), vec!["", ""]);
    }

    #[test]
    fn test_evaluate_indented_snippet() {
        let ns = run("    t = [i for i in range(64)]\n    n = len(t)\n");
        assert_eq!(ns.get("n"), Some(&Value::Int(64)));
    }

    #[test]
    fn test_select_first_qualifying() {
        let ns = run("n = 5\nshort = [1, 2]\nfirst = [1] * 64\nsecond = [2] * 64\n");
        let (name, bytes) = select(&ns, None, 64).unwrap();
        assert_eq!(name, "first");
        assert_eq!(bytes, vec![1; 64]);
    }

    #[test]
    fn test_select_keeps_first_binding_position() {
        let ns = run("b = [0] * 64\na = [1] * 64\nb = [2] * 64\n");
        let (name, bytes) = select(&ns, None, 64).unwrap();
        assert_eq!(name, "b");
        assert_eq!(bytes[0], 2);
    }

    #[test]
    fn test_select_by_name() {
        let ns = run("lo = [0] * 64\nhi = [0xff] * 64\n");
        let (name, bytes) = select(&ns, Some("hi"), 64).unwrap();
        assert_eq!(name, "hi");
        assert_eq!(bytes, vec![0xff; 64]);
        assert_eq!(
            select(&ns, Some("mid"), 64),
            Err(SelectError::Undefined { name: "mid".to_string() })
        );
        assert_eq!(
            select(&ns, Some("lo"), 16),
            Err(SelectError::WrongLength { name: "lo".to_string(), actual: 64, expected: 16 })
        );
    }

    #[test]
    fn test_select_no_array() {
        let ns = run("a = [0] * 63\nb = 64\n");
        assert_eq!(select(&ns, None, 64), Err(SelectError::NoArray { len: 64 }));
    }

    #[test]
    fn test_select_rejects_non_bytes() {
        let ns = run("t = list(range(63)) + [256]\n");
        assert_eq!(
            select(&ns, None, 64),
            Err(SelectError::NotByte { name: "t".to_string(), index: 63, value: "256".to_string() })
        );
        let ns = run("t = [[0]] * 64\n");
        assert!(matches!(select(&ns, None, 64), Err(SelectError::NotByte { index: 0, .. })));
    }

    #[test]
    fn test_booleans_are_bytes() {
        let ns = run("t = [i % 2 == 0 for i in range(64)]\n");
        let (_, bytes) = select(&ns, None, 64).unwrap();
        assert_eq!(&bytes[..4], &[1, 0, 1, 0]);
    }

    #[test]
    fn test_error_lines_are_file_lines() {
        let lines = ["x = 1", "y = [1, 2", "", "z = 3"];
        let err = evaluate(&lines, 10).unwrap_err();
        assert!(matches!(err, SnippetError::Syntax { .. }), "{err}");

        let err = evaluate(&["x = 1", "y = x // 0"], 10).unwrap_err();
        assert_eq!(err.line(), 11);
    }
}
