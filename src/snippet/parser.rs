//! Snippet parser: recursive descent over the token stream.

use super::lexer::{Lexeme, Token};
use super::*;

/// Words the snippet language uses.
const KEYWORDS: &[&str] = &[
    "for", "in", "if", "elif", "else", "and", "or", "not", "pass", "True", "False",
];

/// Python words that are rejected rather than treated as names.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "def", "class", "import", "from", "while", "lambda", "return", "with", "try", "except",
    "finally", "global", "nonlocal", "del", "yield", "assert", "raise", "break", "continue", "as",
    "is", "async", "await", "None",
];

/// Deepest expression or block nesting a snippet may use.
pub const MAX_NESTING: usize = 64;

static EOF: Token = Token::Eof;

pub fn parse(tokens: &[Lexeme]) -> Result<Vec<Stmt>, SnippetError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut program = Vec::new();
    while !parser.at(&Token::Eof) {
        program.push(parser.parse_statement()?);
    }
    Ok(program)
}

struct Parser<'a> {
    tokens: &'a [Lexeme],
    pos: usize,
    /// Current nesting of the tree being built. Bounds both the parser's
    /// recursion and the depth of the resulting tree.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(&EOF, |l| &l.token)
    }

    fn peek(&self) -> &'a Token {
        self.tokens.get(self.pos + 1).map_or(&EOF, |l| &l.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |l| l.line)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.current(), Token::Punct(p) if *p == punct)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.current(), Token::Name(n) if n == word)
    }

    fn try_read(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn try_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), SnippetError> {
        if !self.try_read(punct) {
            return Err(self.unexpected(&format!("`{punct}`")));
        }
        Ok(())
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), SnippetError> {
        if !self.try_keyword(word) {
            return Err(self.unexpected(&format!("`{word}`")));
        }
        Ok(())
    }

    fn expect_newline(&mut self) -> Result<(), SnippetError> {
        match self.current() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn read_name(&mut self) -> Result<String, SnippetError> {
        match self.current() {
            Token::Name(name) => {
                self.check_name(name)?;
                self.advance();
                Ok(name.clone())
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn check_name(&self, name: &str) -> Result<(), SnippetError> {
        if UNSUPPORTED_KEYWORDS.contains(&name) {
            return Err(self.unsupported(format!("`{name}`")));
        }
        if KEYWORDS.contains(&name) {
            return Err(self.syntax(format!("unexpected keyword `{name}`")));
        }
        Ok(())
    }

    fn descend(&mut self) -> Result<(), SnippetError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.unsupported("expression nested too deeply"));
        }
        Ok(())
    }

    /// Run `parse` one nesting level further down.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SnippetError>,
    ) -> Result<T, SnippetError> {
        let saved = self.depth;
        self.descend()?;
        let result = parse(self);
        self.depth = saved;
        result
    }

    fn syntax(&self, message: impl Into<String>) -> SnippetError {
        SnippetError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn unsupported(&self, what: impl Into<String>) -> SnippetError {
        SnippetError::Unsupported {
            line: self.line(),
            what: what.into(),
        }
    }

    fn unexpected(&self, wanted: &str) -> SnippetError {
        let found = match self.current() {
            Token::Name(n) => format!("`{n}`"),
            Token::Int(v) => format!("`{v}`"),
            Token::Punct(p) => format!("`{p}`"),
            Token::Newline => "end of line".to_string(),
            Token::Indent => "indent".to_string(),
            Token::Dedent => "dedent".to_string(),
            Token::Eof => "end of snippet".to_string(),
        };
        self.syntax(format!("expected {wanted} but found {found}"))
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt, SnippetError> {
        let line = self.line();
        match self.current() {
            Token::Indent => Err(self.syntax("unexpected indent")),
            Token::Name(word) if word == "for" => self.parse_for(line),
            Token::Name(word) if word == "if" => self.parse_if(line),
            Token::Name(word) if word == "pass" => {
                self.advance();
                self.expect_newline()?;
                Ok(Stmt::Pass)
            }
            Token::Name(word) if UNSUPPORTED_KEYWORDS.contains(&word.as_str()) => {
                Err(self.unsupported(format!("`{word}` statement")))
            }
            _ => self.parse_simple_statement(line),
        }
    }

    fn parse_simple_statement(&mut self, line: usize) -> Result<Stmt, SnippetError> {
        let expr = self.parse_expr()?;

        let stmt = if self.try_read("=") {
            let target = self.to_target(expr)?;
            let value = self.parse_expr()?;
            if self.at_punct("=") {
                return Err(self.unsupported("chained assignment"));
            }
            Stmt::Assign {
                target,
                value,
                line,
            }
        } else if let Token::Punct(p) = self.current() {
            if *p == "/=" {
                return Err(self.unsupported("true division `/=`; use `//=`"));
            }
            match BinOp::from_augmented(p) {
                Some(op) => {
                    self.advance();
                    let target = self.to_target(expr)?;
                    let value = self.parse_expr()?;
                    Stmt::AugAssign {
                        target,
                        op,
                        value,
                        line,
                    }
                }
                None if *p == "," => return Err(self.unsupported("tuple")),
                None => Stmt::Expr { expr, line },
            }
        } else {
            Stmt::Expr { expr, line }
        };

        self.expect_newline()?;
        Ok(stmt)
    }

    fn to_target(&self, expr: Expr) -> Result<Target, SnippetError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index(base, index) => match *base {
                Expr::Name(name) => Ok(Target::Item(name, *index)),
                _ => Err(self.unsupported("nested item assignment")),
            },
            Expr::Slice { .. } => Err(self.unsupported("slice assignment")),
            _ => Err(self.syntax("cannot assign to expression")),
        }
    }

    fn parse_for(&mut self, line: usize) -> Result<Stmt, SnippetError> {
        self.expect_keyword("for")?;
        let var = self.read_name()?;
        if self.at_punct(",") {
            return Err(self.unsupported("tuple unpacking"));
        }
        self.expect_keyword("in")?;
        let iter = self.parse_expr()?;
        let body = self.parse_suite()?;
        Ok(Stmt::For {
            var,
            iter,
            body,
            line,
        })
    }

    fn parse_if(&mut self, line: usize) -> Result<Stmt, SnippetError> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        branches.push((cond, self.parse_suite()?));

        let mut orelse = Vec::new();
        loop {
            if self.try_keyword("elif") {
                let cond = self.parse_expr()?;
                branches.push((cond, self.parse_suite()?));
            } else if self.try_keyword("else") {
                orelse = self.parse_suite()?;
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            orelse,
            line,
        })
    }

    /// `:` followed by either a simple statement on the same line or an
    /// indented block.
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, SnippetError> {
        self.nested(Self::parse_suite_body)
    }

    fn parse_suite_body(&mut self) -> Result<Vec<Stmt>, SnippetError> {
        self.expect(":")?;
        if !self.at(&Token::Newline) {
            let line = self.line();
            return Ok(vec![self.parse_simple_statement(line)?]);
        }
        self.advance();

        if !self.at(&Token::Indent) {
            return Err(self.unexpected("an indented block"));
        }
        self.advance();

        let mut body = Vec::new();
        while !self.at(&Token::Dedent) && !self.at(&Token::Eof) {
            body.push(self.parse_statement()?);
        }
        if self.at(&Token::Dedent) {
            self.advance();
        }
        Ok(body)
    }

    // ---------------------------------------------------------------
    // Expressions, lowest precedence first
    // ---------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, SnippetError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr, SnippetError> {
        let expr = self.parse_or()?;
        if self.try_keyword("if") {
            let cond = self.parse_or()?;
            self.expect_keyword("else")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(expr),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, SnippetError> {
        let saved = self.depth;
        let mut lhs = self.parse_and()?;
        while self.try_keyword("or") {
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, SnippetError> {
        let saved = self.depth;
        let mut lhs = self.parse_not()?;
        while self.try_keyword("and") {
            self.descend()?;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, SnippetError> {
        if self.try_keyword("not") {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SnippetError> {
        let lhs = self.parse_bitor()?;
        let mut chain = Vec::new();

        loop {
            let op = match self.current() {
                Token::Punct("==") => CmpOp::Eq,
                Token::Punct("!=") => CmpOp::Ne,
                Token::Punct("<") => CmpOp::Lt,
                Token::Punct("<=") => CmpOp::Le,
                Token::Punct(">") => CmpOp::Gt,
                Token::Punct(">=") => CmpOp::Ge,
                Token::Name(n) if n == "in" => CmpOp::In,
                Token::Name(n) if n == "not" && matches!(self.peek(), Token::Name(m) if m == "in") => {
                    self.advance();
                    CmpOp::NotIn
                }
                Token::Name(n) if n == "is" => return Err(self.unsupported("`is`")),
                _ => break,
            };
            self.advance();
            chain.push((op, self.parse_bitor()?));
        }

        if chain.is_empty() {
            Ok(lhs)
        } else {
            Ok(Expr::Compare(Box::new(lhs), chain))
        }
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, SnippetError>,
    ) -> Result<Expr, SnippetError> {
        let saved = self.depth;
        let mut lhs = next(self)?;
        'outer: loop {
            for &(symbol, op) in ops {
                if self.try_read(symbol) {
                    self.descend()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            self.depth = saved;
            return Ok(lhs);
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr, SnippetError> {
        self.parse_binary_level(&[("|", BinOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, SnippetError> {
        self.parse_binary_level(&[("^", BinOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr, SnippetError> {
        self.parse_binary_level(&[("&", BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr, SnippetError> {
        self.parse_binary_level(&[("<<", BinOp::Shl), (">>", BinOp::Shr)], Self::parse_arith)
    }

    fn parse_arith(&mut self) -> Result<Expr, SnippetError> {
        self.parse_binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, SnippetError> {
        let expr = self.parse_binary_level(
            &[("*", BinOp::Mul), ("//", BinOp::FloorDiv), ("%", BinOp::Mod)],
            Self::parse_unary,
        )?;
        if self.at_punct("/") {
            return Err(self.unsupported("true division `/`; use `//`"));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, SnippetError> {
        let op = match self.current() {
            Token::Punct("-") => UnaryOp::Neg,
            Token::Punct("+") => UnaryOp::Pos,
            Token::Punct("~") => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_power(&mut self) -> Result<Expr, SnippetError> {
        let base = self.parse_primary()?;
        if self.try_read("**") {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, SnippetError> {
        let saved = self.depth;
        let mut expr = self.parse_atom()?;

        loop {
            if self.at_punct("(") {
                let Expr::Name(func) = expr else {
                    return Err(self.unsupported("calling an expression"));
                };
                self.advance();
                let args = self.parse_arguments()?;
                expr = Expr::Call { func, args };
            } else if self.try_read("[") {
                self.descend()?;
                expr = self.parse_subscript(expr)?;
            } else if self.try_read(".") {
                self.descend()?;
                let method = match self.current() {
                    Token::Name(name) => name.clone(),
                    _ => return Err(self.unexpected("a method name")),
                };
                self.advance();
                if !self.try_read("(") {
                    return Err(self.unsupported("attribute access"));
                }
                let args = self.parse_arguments()?;
                expr = Expr::Method {
                    receiver: Box::new(expr),
                    method,
                    args,
                };
            } else {
                self.depth = saved;
                return Ok(expr);
            }
        }
    }

    /// Arguments after an opening `(`, through the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, SnippetError> {
        let mut args = Vec::new();
        while !self.try_read(")") {
            if self.at_punct("*") || self.at_punct("**") {
                return Err(self.unsupported("argument unpacking"));
            }
            args.push(self.parse_expr()?);
            if self.at_punct("=") {
                return Err(self.unsupported("keyword arguments"));
            }
            if self.at_keyword("for") {
                return Err(self.unsupported("generator expression"));
            }
            if !self.try_read(",") && !self.at_punct(")") {
                return Err(self.unexpected("`,` or `)`"));
            }
        }
        Ok(args)
    }

    /// Index or slice after an opening `[`, through the closing `]`.
    fn parse_subscript(&mut self, target: Expr) -> Result<Expr, SnippetError> {
        let lower = if self.at_punct(":") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        if !self.try_read(":") {
            self.expect("]")?;
            return match lower {
                Some(index) => Ok(Expr::Index(Box::new(target), index)),
                None => Err(self.syntax("empty subscript")),
            };
        }

        let upper = if self.at_punct(":") || self.at_punct("]") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let step = if self.try_read(":") && !self.at_punct("]") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect("]")?;

        Ok(Expr::Slice {
            target: Box::new(target),
            lower,
            upper,
            step,
        })
    }

    fn parse_atom(&mut self) -> Result<Expr, SnippetError> {
        match self.current() {
            Token::Int(value) => {
                self.advance();
                Ok(Expr::Int(*value))
            }
            Token::Name(name) if name == "True" || name == "False" => {
                self.advance();
                Ok(Expr::Bool(name == "True"))
            }
            Token::Name(_) => Ok(Expr::Name(self.read_name()?)),
            Token::Punct("(") => {
                self.advance();
                if self.at_punct(")") {
                    return Err(self.unsupported("tuple"));
                }
                let expr = self.parse_expr()?;
                if self.at_punct(",") {
                    return Err(self.unsupported("tuple"));
                }
                if self.at_keyword("for") {
                    return Err(self.unsupported("generator expression"));
                }
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                self.advance();
                self.parse_list()
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// List display or comprehension after an opening `[`.
    fn parse_list(&mut self) -> Result<Expr, SnippetError> {
        if self.try_read("]") {
            return Ok(Expr::List(Vec::new()));
        }

        let first = self.parse_expr()?;
        if self.at_keyword("for") {
            let clauses = self.parse_comp_clauses()?;
            self.expect("]")?;
            return Ok(Expr::ListComp {
                element: Box::new(first),
                clauses,
            });
        }

        let mut items = vec![first];
        while self.try_read(",") {
            if self.at_punct("]") {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect("]")?;
        Ok(Expr::List(items))
    }

    fn parse_comp_clauses(&mut self) -> Result<Vec<CompClause>, SnippetError> {
        // Clauses run as nested loops, so each one counts as a level.
        let saved = self.depth;
        let mut clauses = Vec::new();
        loop {
            if self.at_keyword("for") || self.at_keyword("if") {
                self.descend()?;
            }
            if self.try_keyword("for") {
                let var = self.read_name()?;
                if self.at_punct(",") {
                    return Err(self.unsupported("tuple unpacking"));
                }
                self.expect_keyword("in")?;
                let iter = self.parse_or()?;
                clauses.push(CompClause::For { var, iter });
            } else if self.try_keyword("if") {
                clauses.push(CompClause::If(self.parse_or()?));
            } else {
                self.depth = saved;
                return Ok(clauses);
            }
        }
    }
}
