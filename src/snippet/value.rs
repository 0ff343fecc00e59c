//! Runtime values of the snippet language and the operators on them.
//!
//! Integers are 64-bit and every arithmetic operation is checked. Booleans
//! take part in arithmetic as 0 and 1. Lists have value semantics: binding
//! a list to a second name copies it.
//!
//! Lists are bounded three ways: [`MAX_LIST_LEN`] elements, [`MAX_VALUES`]
//! values counting everything nested inside, and [`MAX_LIST_DEPTH`] levels.

use std::cmp::Ordering;
use std::fmt;

use super::{BinOp, CmpOp, UnaryOp};

/// Upper bound on the length of any list a snippet builds.
pub const MAX_LIST_LEN: usize = 1 << 16;

/// Upper bound on the values held by one list, nested lists included.
pub const MAX_VALUES: usize = 1 << 20;

/// Upper bound on how deeply lists may be nested.
pub const MAX_LIST_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "an integer",
            Value::Bool(_) => "a boolean",
            Value::List(_) => "a list",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn expect_int(&self, what: &str) -> Result<i64, String> {
        self.as_int()
            .ok_or_else(|| format!("{what} must be an integer, not {}", self.type_name()))
    }

    /// Number of values in `self`, nested ones included, and its list
    /// nesting depth. Walks with an explicit stack.
    pub fn measure(&self) -> (usize, usize) {
        let mut count = 0;
        let mut depth = 0;
        let mut pending = vec![(self, 0)];
        while let Some((value, level)) = pending.pop() {
            count += 1;
            if let Value::List(items) = value {
                depth = depth.max(level + 1);
                pending.extend(items.iter().map(|item| (item, level + 1)));
            }
        }
        (count, depth)
    }

    /// The elements of an iterable value.
    pub fn into_items(self) -> Result<Vec<Value>, String> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(format!("{} is not iterable", other.type_name())),
        }
    }

    /// Equality as the language sees it: `1 == True`, lists element-wise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`.
    pub fn order(&self, other: &Value) -> Result<Ordering, String> {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.order(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => Ok(x.cmp(&y)),
                _ => Err(format!(
                    "cannot order {} and {}",
                    a.type_name(),
                    b.type_name()
                )),
            },
        }
    }

    pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, String> {
        let v = operand
            .as_int()
            .ok_or_else(|| format!("bad operand for unary operator: {}", operand.type_name()))?;
        let result = match op {
            UnaryOp::Neg => v.checked_neg().ok_or_else(overflow)?,
            UnaryOp::Pos => v,
            UnaryOp::Invert => !v,
        };
        Ok(Value::Int(result))
    }

    pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
        match (op, lhs, rhs) {
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                check_len(a.len().saturating_add(b.len()))?;
                check_values(contents(a).saturating_add(contents(b)))?;
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items)) => {
                let count = n.expect_int("list repeat count")?;
                let count = usize::try_from(count).unwrap_or(0);
                let total = items.len().saturating_mul(count);
                check_len(total)?;
                check_values(contents(items).saturating_mul(count))?;
                Ok(Value::List(items.iter().cycle().take(total).cloned().collect()))
            }
            (BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor, Value::Bool(a), Value::Bool(b)) => {
                Ok(Value::Bool(match op {
                    BinOp::BitAnd => a & b,
                    BinOp::BitOr => a | b,
                    _ => a ^ b,
                }))
            }
            _ => match (lhs.as_int(), rhs.as_int()) {
                (Some(a), Some(b)) => int_binary(op, a, b).map(Value::Int),
                _ => Err(format!(
                    "unsupported operand types for {}: {} and {}",
                    op.symbol(),
                    lhs.type_name(),
                    rhs.type_name()
                )),
            },
        }
    }

    pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, String> {
        Ok(match op {
            CmpOp::Eq => lhs.equals(rhs),
            CmpOp::Ne => !lhs.equals(rhs),
            CmpOp::Lt => lhs.order(rhs)? == Ordering::Less,
            CmpOp::Le => lhs.order(rhs)? != Ordering::Greater,
            CmpOp::Gt => lhs.order(rhs)? == Ordering::Greater,
            CmpOp::Ge => lhs.order(rhs)? != Ordering::Less,
            CmpOp::In | CmpOp::NotIn => {
                let items = rhs.as_list().ok_or_else(|| {
                    format!("argument of type {} is not iterable", rhs.type_name())
                })?;
                let found = items.iter().any(|item| item.equals(lhs));
                found == (op == CmpOp::In)
            }
        })
    }

    /// `value[index]`, with negative indices counting from the end.
    pub fn item(&self, index: &Value) -> Result<Value, String> {
        let items = self
            .as_list()
            .ok_or_else(|| format!("{} is not subscriptable", self.type_name()))?;
        let at = resolve_index(items.len(), index)?;
        Ok(items[at].clone())
    }

    /// `value[lower:upper:step]`
    pub fn slice(
        &self,
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
    ) -> Result<Value, String> {
        let items = self
            .as_list()
            .ok_or_else(|| format!("{} is not subscriptable", self.type_name()))?;
        let len = items.len() as i64;
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err("slice step cannot be zero".to_string());
        }

        let clamp = |bound: i64, low: i64, high: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(low, high)
        };

        let mut out = Vec::new();
        if step > 0 {
            let start = lower.map_or(0, |b| clamp(b, 0, len));
            let stop = upper.map_or(len, |b| clamp(b, 0, len));
            let mut i = start;
            while i < stop {
                out.push(items[i as usize].clone());
                i = i.saturating_add(step);
            }
        } else {
            let start = lower.map_or(len - 1, |b| clamp(b, -1, len - 1));
            let stop = upper.map_or(-1, |b| clamp(b, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(items[i as usize].clone());
                i = i.saturating_add(step);
            }
        }
        Ok(Value::List(out))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

pub fn check_len(len: usize) -> Result<(), String> {
    if len > MAX_LIST_LEN {
        return Err(format!("list of {len} elements exceeds the limit of {MAX_LIST_LEN}"));
    }
    Ok(())
}

/// Fails when a list would hold more than [`MAX_VALUES`] values.
pub fn check_values(count: usize) -> Result<(), String> {
    if count > MAX_VALUES {
        return Err(format!(
            "list of {count} nested values exceeds the limit of {MAX_VALUES}"
        ));
    }
    Ok(())
}

/// Values held by the elements of a list, nested ones included.
fn contents(items: &[Value]) -> usize {
    items.iter().map(|item| item.measure().0).sum()
}

/// Position addressed by `index` in a list of `len` elements.
pub fn resolve_index(len: usize, index: &Value) -> Result<usize, String> {
    let i = index.expect_int("list index")?;
    let at = if i < 0 { i + len as i64 } else { i };
    if at < 0 || at >= len as i64 {
        return Err(format!("list index {i} out of range"));
    }
    Ok(at as usize)
}

fn overflow() -> String {
    "integer overflow".to_string()
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<i64, String> {
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::FloorDiv => {
            if b == 0 {
                return Err("integer division by zero".to_string());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            // Round toward negative infinity.
            Ok(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err("integer modulo by zero".to_string());
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // The result takes the sign of the divisor.
            Ok(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        BinOp::Pow => {
            if b < 0 {
                return Err("negative exponents are not supported".to_string());
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)
        }
        BinOp::Shl => {
            if b < 0 {
                return Err("negative shift count".to_string());
            }
            if a == 0 {
                return Ok(0);
            }
            if b >= 63 {
                return Err(overflow());
            }
            let shifted = a << b;
            if shifted >> b != a {
                return Err(overflow());
            }
            Ok(shifted)
        }
        BinOp::Shr => {
            if b < 0 {
                return Err("negative shift count".to_string());
            }
            Ok(a >> b.min(63))
        }
        BinOp::BitAnd => Ok(a & b),
        BinOp::BitOr => Ok(a | b),
        BinOp::BitXor => Ok(a ^ b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    fn list(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_floor_division_and_modulo() {
        let cases = [(7, 2, 3, 1), (-7, 2, -4, 1), (7, -2, -4, -1), (-7, -2, 3, -1)];
        for (a, b, q, r) in cases {
            assert_eq!(Value::binary(BinOp::FloorDiv, &int(a), &int(b)), Ok(int(q)));
            assert_eq!(Value::binary(BinOp::Mod, &int(a), &int(b)), Ok(int(r)));
        }
        assert!(Value::binary(BinOp::FloorDiv, &int(1), &int(0)).is_err());
        assert!(Value::binary(BinOp::FloorDiv, &int(i64::MIN), &int(-1)).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(Value::binary(BinOp::Mul, &int(i64::MAX), &int(2)).is_err());
        assert!(Value::binary(BinOp::Shl, &int(1), &int(63)).is_err());
        assert!(Value::binary(BinOp::Pow, &int(2), &int(64)).is_err());
        assert_eq!(Value::binary(BinOp::Shl, &int(1), &int(62)), Ok(int(1 << 62)));
        assert_eq!(Value::binary(BinOp::Shr, &int(-8), &int(100)), Ok(int(-1)));
    }

    #[test]
    fn test_list_operators() {
        assert_eq!(
            Value::binary(BinOp::Add, &list(&[1]), &list(&[2, 3])),
            Ok(list(&[1, 2, 3]))
        );
        assert_eq!(Value::binary(BinOp::Mul, &int(2), &list(&[7])), Ok(list(&[7, 7])));
        assert_eq!(Value::binary(BinOp::Mul, &list(&[7]), &int(-3)), Ok(list(&[])));
        assert!(Value::binary(BinOp::Add, &list(&[1]), &int(1)).is_err());
        assert!(Value::binary(BinOp::Mul, &list(&[0; 2]), &int(1 << 16)).is_err());
    }

    #[test]
    fn test_measure() {
        assert_eq!(int(5).measure(), (1, 0));
        assert_eq!(list(&[]).measure(), (1, 1));
        let nested = Value::List(vec![list(&[1, 2]), int(3), Value::List(vec![list(&[])])]);
        assert_eq!(nested.measure(), (7, 3));
    }

    #[test]
    fn test_nested_repeat_is_bounded() {
        let full = list(&vec![0; MAX_LIST_LEN]);
        let wrapped = Value::List(vec![full.clone()]);
        assert!(Value::binary(BinOp::Mul, &wrapped, &int(8)).is_ok());
        let err = Value::binary(BinOp::Mul, &wrapped, &int(1 << 16)).unwrap_err();
        assert!(err.contains("nested values"), "{err}");
        assert!(Value::binary(BinOp::Add, &Value::List(vec![full.clone(); 16]), &wrapped).is_err());
    }

    #[test]
    fn test_booleans() {
        let t = Value::Bool(true);
        assert_eq!(Value::binary(BinOp::Add, &t, &t), Ok(int(2)));
        assert_eq!(Value::binary(BinOp::BitXor, &t, &t), Ok(Value::Bool(false)));
        assert!(t.equals(&int(1)));
        assert_eq!(Value::compare(CmpOp::In, &int(1), &Value::List(vec![t])), Ok(true));
    }

    #[test]
    fn test_slices() {
        let v = list(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(v.slice(None, None, Some(-1)), Ok(list(&[5, 4, 3, 2, 1, 0])));
        assert_eq!(v.slice(Some(1), Some(-1), Some(2)), Ok(list(&[1, 3])));
        assert_eq!(v.slice(Some(-2), None, None), Ok(list(&[4, 5])));
        assert_eq!(v.slice(Some(10), Some(20), None), Ok(list(&[])));
        assert_eq!(v.slice(Some(4), Some(1), Some(-2)), Ok(list(&[4, 2])));
        assert!(v.slice(None, None, Some(0)).is_err());
    }

    #[test]
    fn test_item() {
        let v = list(&[10, 20, 30]);
        assert_eq!(v.item(&int(-1)), Ok(int(30)));
        assert!(v.item(&int(3)).is_err());
        assert!(int(3).item(&int(0)).is_err());
    }

    #[test]
    fn test_display() {
        let v = Value::List(vec![int(1), Value::Bool(false), list(&[])]);
        assert_eq!(v.to_string(), "[1, False, []]");
    }
}
