//! Tree-walking interpreter for parsed snippets.

use super::builtins;
use super::value::{check_len, resolve_index, Value, MAX_LIST_DEPTH};
use super::*;

/// Work one snippet may do: one step per statement and comprehension
/// iteration, plus one per value of every list it produces or copies.
pub const MAX_STEPS: usize = 1_000_000;

/// Executes a program in a namespace that starts out empty.
pub struct Interpreter {
    namespace: Namespace,
    /// Comprehension variables, innermost last.
    locals: Vec<(String, Value)>,
    steps: usize,
    line: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            namespace: Namespace::new(),
            locals: Vec::new(),
            steps: 0,
            line: 0,
        }
    }

    pub fn run(mut self, program: &[Stmt]) -> Result<Namespace, SnippetError> {
        self.exec_block(program)?;
        log::trace!(
            "snippet finished after {} steps with {} bindings",
            self.steps,
            self.namespace.len()
        );
        Ok(self.namespace)
    }

    fn error(&self, message: impl Into<String>) -> SnippetError {
        SnippetError::Runtime {
            line: self.line,
            message: message.into(),
        }
    }

    fn tick(&mut self) -> Result<(), SnippetError> {
        self.spend(1)
    }

    fn spend(&mut self, steps: usize) -> Result<(), SnippetError> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > MAX_STEPS {
            return Err(self.error(format!("evaluation exceeded {MAX_STEPS} steps")));
        }
        Ok(())
    }

    /// Pay for a list value and check how deeply it nests.
    fn charge(&mut self, value: &Value) -> Result<(), SnippetError> {
        if let Value::List(_) = value {
            let (count, depth) = value.measure();
            if depth > MAX_LIST_DEPTH {
                return Err(self.error(format!(
                    "lists nested more than {MAX_LIST_DEPTH} levels deep"
                )));
            }
            self.spend(count)?;
        }
        Ok(())
    }

    /// Check a value about to be stored one level inside a list.
    fn check_element(&self, value: &Value) -> Result<(), SnippetError> {
        if value.measure().1 >= MAX_LIST_DEPTH {
            return Err(self.error(format!(
                "lists nested more than {MAX_LIST_DEPTH} levels deep"
            )));
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), SnippetError> {
        stmts.iter().try_for_each(|stmt| self.exec(stmt))
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), SnippetError> {
        self.tick()?;
        match stmt {
            Stmt::Assign {
                target,
                value,
                line,
            } => {
                self.line = *line;
                let value = self.eval(value)?;
                self.assign(target, value)
            }
            Stmt::AugAssign {
                target,
                op,
                value,
                line,
            } => {
                self.line = *line;
                let current = match target {
                    Target::Name(name) => self.lookup(name)?.clone(),
                    Target::Item(name, index) => {
                        let index = self.eval(index)?;
                        let list = self.lookup(name)?;
                        list.item(&index).map_err(|e| self.error(e))?
                    }
                };
                self.charge(&current)?;
                let rhs = self.eval(value)?;
                let updated = Value::binary(*op, &current, &rhs).map_err(|e| self.error(e))?;
                self.assign(target, updated)
            }
            Stmt::For {
                var,
                iter,
                body,
                line,
            } => {
                self.line = *line;
                let items = self.eval(iter)?.into_items().map_err(|e| self.error(e))?;
                for item in items {
                    self.namespace.insert(var.clone(), item);
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Stmt::If {
                branches,
                orelse,
                line,
            } => {
                self.line = *line;
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(orelse)
            }
            Stmt::Expr { expr, line } => {
                self.line = *line;
                match expr {
                    Expr::Method {
                        receiver,
                        method,
                        args,
                    } => self.call_method(receiver, method, args).map(drop),
                    _ => self.eval(expr).map(drop),
                }
            }
            Stmt::Pass => Ok(()),
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<(), SnippetError> {
        match target {
            Target::Name(name) => {
                self.namespace.insert(name.clone(), value);
                Ok(())
            }
            Target::Item(name, index) => {
                let index = self.eval(index)?;
                self.check_element(&value)?;
                let line = self.line;
                let list = self.lookup_mut(name)?;
                let kind = list.type_name();
                let Value::List(items) = list else {
                    let message = format!("{kind} does not support item assignment");
                    return Err(SnippetError::Runtime { line, message });
                };
                let at = resolve_index(items.len(), &index)
                    .map_err(|message| SnippetError::Runtime { line, message })?;
                items[at] = value;
                Ok(())
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&Value, SnippetError> {
        self.locals
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value)
            .or_else(|| self.namespace.get(name))
            .ok_or_else(|| self.error(format!("name '{name}' is not defined")))
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Value, SnippetError> {
        let line = self.line;
        if let Some((_, value)) = self.locals.iter_mut().rev().find(|(local, _)| local == name) {
            return Ok(value);
        }
        self.namespace.get_mut(name).ok_or_else(|| SnippetError::Runtime {
            line,
            message: format!("name '{name}' is not defined"),
        })
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, SnippetError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_int(&mut self, expr: &Expr, what: &str) -> Result<i64, SnippetError> {
        let value = self.eval(expr)?;
        value.expect_int(what).map_err(|e| self.error(e))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, SnippetError> {
        let value = self.eval_expr(expr)?;
        self.charge(&value)?;
        Ok(value)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, SnippetError> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Name(name) => self.lookup(name).cloned(),
            Expr::List(items) => {
                check_len(items.len()).map_err(|e| self.error(e))?;
                Ok(Value::List(self.eval_all(items)?))
            }
            Expr::ListComp { element, clauses } => {
                let mut out = Vec::new();
                self.comprehend(element, clauses, &mut out)?;
                Ok(Value::List(out))
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                Value::unary(*op, &v).map_err(|e| self.error(e))
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Value::binary(*op, &l, &r).map_err(|e| self.error(e))
            }
            Expr::Compare(first, chain) => {
                let mut lhs = self.eval(first)?;
                for (op, operand) in chain {
                    let rhs = self.eval(operand)?;
                    if !Value::compare(*op, &lhs, &rhs).map_err(|e| self.error(e))? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs)
            }
            Expr::Or(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs)
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.truthy())),
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { func, args } => {
                if self.lookup(func).is_ok() {
                    return Err(self.error(format!("'{func}' is not callable")));
                }
                if !builtins::is_builtin(func) {
                    return Err(self.error(format!("name '{func}' is not defined")));
                }
                let args = self.eval_all(args)?;
                builtins::call(func, args).map_err(|e| self.error(e))
            }
            Expr::Method {
                receiver,
                method,
                args,
            } => self
                .call_method(receiver, method, args)?
                .ok_or_else(|| self.error(format!("`{method}` does not return a value"))),
            Expr::Index(target, index) => {
                // Index a bound list in place instead of copying it.
                if let Expr::Name(name) = target.as_ref() {
                    let index = self.eval(index)?;
                    let list = self.lookup(name)?;
                    return list.item(&index).map_err(|e| self.error(e));
                }
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                target.item(&index).map_err(|e| self.error(e))
            }
            Expr::Slice {
                target,
                lower,
                upper,
                step,
            } => {
                let target = self.eval(target)?;
                let lower = self.eval_bound(lower.as_deref())?;
                let upper = self.eval_bound(upper.as_deref())?;
                let step = self.eval_bound(step.as_deref())?;
                target
                    .slice(lower, upper, step)
                    .map_err(|e| self.error(e))
            }
        }
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> Result<Option<i64>, SnippetError> {
        bound.map(|b| self.eval_int(b, "slice index")).transpose()
    }

    /// Method calls on a plain name mutate that binding in place.
    fn call_method(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Result<Option<Value>, SnippetError> {
        let args = self.eval_all(args)?;
        if method == "append" {
            args.iter().try_for_each(|arg| self.check_element(arg))?;
        }
        let line = self.line;
        let result = match receiver {
            Expr::Name(name) => builtins::call_method(self.lookup_mut(name)?, method, args),
            other => {
                let mut value = self.eval(other)?;
                builtins::call_method(&mut value, method, args)
            }
        };
        result.map_err(|message| SnippetError::Runtime { line, message })
    }

    fn comprehend(
        &mut self,
        element: &Expr,
        clauses: &[CompClause],
        out: &mut Vec<Value>,
    ) -> Result<(), SnippetError> {
        match clauses.split_first() {
            None => {
                check_len(out.len() + 1).map_err(|e| self.error(e))?;
                out.push(self.eval(element)?);
                Ok(())
            }
            Some((CompClause::For { var, iter }, rest)) => {
                let items = self.eval(iter)?.into_items().map_err(|e| self.error(e))?;
                for item in items {
                    self.tick()?;
                    self.locals.push((var.clone(), item));
                    let result = self.comprehend(element, rest, out);
                    self.locals.pop();
                    result?;
                }
                Ok(())
            }
            Some((CompClause::If(cond), rest)) => {
                if self.eval(cond)?.truthy() {
                    self.comprehend(element, rest, out)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<Namespace, SnippetError> {
        let lines: Vec<&str> = source.lines().collect();
        evaluate(&lines, 1)
    }

    fn ints(ns: &Namespace, name: &str) -> Vec<i64> {
        ns[name]
            .as_list()
            .unwrap_or_else(|| panic!("{name} is not a list"))
            .iter()
            .map(|v| v.as_int().unwrap())
            .collect()
    }

    #[test]
    fn test_identity_comprehension() {
        let ns = run("table = [i for i in range(64)]").unwrap();
        assert_eq!(ints(&ns, "table"), (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_nested_comprehension() {
        let ns = run("t = [4 * lane + b for lane in range(4) for b in [3, 2, 1, 0] if b != 1]").unwrap();
        assert_eq!(ints(&ns, "t"), vec![3, 2, 0, 7, 6, 4, 11, 10, 8, 15, 14, 12]);
    }

    #[test]
    fn test_comprehension_variables_do_not_leak() {
        let ns = run("t = [i for i in range(3)]").unwrap();
        assert!(!ns.contains_key("i"));
        assert!(run("t = [i for i in range(3)]\nu = i").is_err());
    }

    #[test]
    fn test_loop_builds_table() {
        let source = "\
t = []
for i in range(16):
    if i % 4 == 0:
        t += [i, 0x80]
    elif i % 4 == 1:
        t.append(i)
        t.append(0x80)
    else:
        t.extend([0x80, i])
";
        let ns = run(source).unwrap();
        let t = ints(&ns, "t");
        assert_eq!(t.len(), 32);
        assert_eq!(&t[..8], &[0, 0x80, 1, 0x80, 0x80, 2, 0x80, 3]);
        // The loop variable stays bound after the loop.
        assert_eq!(ns.get("i"), Some(&Value::Int(15)));
    }

    #[test]
    fn test_item_assignment() {
        let ns = run("t = [0] * 8\nfor i in range(8):\n    t[-1 - i] = i * i\nt[0] += 1").unwrap();
        assert_eq!(ints(&ns, "t"), vec![50, 36, 25, 16, 9, 4, 1, 0]);
    }

    #[test]
    fn test_binding_order() {
        let ns = run("b = 1\na = 2\nb = 3\nfor c in [1]:\n    pass").unwrap();
        let names: Vec<&str> = ns.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_expressions() {
        let ns = run(
            "a = -7 // 2\nb = 2 ** 10 >> 3\nc = 1 if 3 < 4 <= 4 else 2\nd = [1, 2, 3][::-1]\n\
             e = 5 in [1, 5]\nf = not [] and 7\ng = ~0 & 0xff\nh = sorted([3, 1, 2])[-1]\n\
             k = [1, 2, 3, 4].index(3)",
        )
        .unwrap();
        assert_eq!(ns["a"], Value::Int(-4));
        assert_eq!(ns["b"], Value::Int(128));
        assert_eq!(ns["c"], Value::Int(1));
        assert_eq!(ints(&ns, "d"), vec![3, 2, 1]);
        assert_eq!(ns["e"], Value::Bool(true));
        assert_eq!(ns["f"], Value::Int(7));
        assert_eq!(ns["g"], Value::Int(255));
        assert_eq!(ns["h"], Value::Int(3));
        assert_eq!(ns["k"], Value::Int(2));
    }

    #[test]
    fn test_copy_semantics() {
        let ns = run("a = [1]\nb = a\na.append(2)").unwrap();
        assert_eq!(ints(&ns, "a"), vec![1, 2]);
        assert_eq!(ints(&ns, "b"), vec![1]);
    }

    #[test]
    fn test_runtime_errors() {
        for (source, line) in [
            ("x = y", 1),
            ("x = 1\nx = [1][5]", 2),
            ("x = 1 // 0", 1),
            ("x = [1] + 1", 1),
            ("range = 3\nx = range(4)", 2),
            ("x = print(1)", 1),
            ("t = [1]\nx = t.append(2)", 2),
            ("x = 3\nx.append(1)", 2),
            ("for i in 5:\n    pass", 1),
            ("t = [0] * 100000", 1),
        ] {
            match run(source) {
                Err(SnippetError::Runtime { line: got, .. }) => {
                    assert_eq!(got, line, "wrong line for {source:?}")
                }
                other => panic!("{source:?} should fail at run time, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_nested_lists_are_bounded() {
        let err = run("a = [0] * 65536\nb = [a] * 65536").unwrap_err();
        assert!(matches!(err, SnippetError::Runtime { line: 2, .. }), "{err}");
        assert!(err.to_string().contains("nested values"), "{err}");

        let err = run("a = [0] * 65536\nb = [a] * 1024").unwrap_err();
        assert!(matches!(err, SnippetError::Runtime { line: 2, .. }), "{err}");
    }

    #[test]
    fn test_copies_cost_steps() {
        let err = run("a = [0] * 65536\nfor i in range(100):\n    b = a").unwrap_err();
        assert!(matches!(err, SnippetError::Runtime { line: 3, .. }), "{err}");
        assert!(err.to_string().contains("steps"), "{err}");

        // Indexing a bound list does not copy it.
        let ns = run("a = [7] * 65536\nt = [a[i] for i in range(64)]").unwrap();
        assert_eq!(ints(&ns, "t"), vec![7; 64]);
    }

    #[test]
    fn test_list_depth_limit() {
        for source in [
            "t = []\nfor i in range(100):\n    t = [t]",
            "t = []\nfor i in range(100):\n    t.append(t)",
            "t = [0]\nfor i in range(100):\n    t[0] = t",
        ] {
            match run(source) {
                Err(SnippetError::Runtime { line: 3, message }) => {
                    assert!(message.contains("nested more than"), "{message}")
                }
                other => panic!("{source:?} should hit the depth limit, got {other:?}"),
            }
        }
        assert!(run("t = []\nfor i in range(20):\n    t = [t]").is_ok());
    }

    #[test]
    fn test_step_limit() {
        let err = run("t = []\nfor i in range(60000):\n    for j in range(60000):\n        pass").unwrap_err();
        assert!(err.to_string().contains("steps"), "{err}");
    }
}
