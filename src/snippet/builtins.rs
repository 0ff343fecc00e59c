//! Builtin functions and list methods available to snippets.
//!
//! Builtins are looked up by name at call sites only; they are never bound
//! in the namespace, so they cannot be mistaken for a table.

use std::cmp::Ordering;

use super::value::{check_len, Value, MAX_LIST_LEN};

pub const BUILTINS: &[&str] = &[
    "range", "len", "list", "reversed", "sorted", "sum", "min", "max", "abs",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
    match name {
        "range" => range(&args),
        "len" => {
            let [arg] = one(name, args)?;
            let items = list_arg(name, &arg)?;
            Ok(Value::Int(items.len() as i64))
        }
        "list" => match args.len() {
            0 => Ok(Value::List(Vec::new())),
            _ => {
                let [arg] = one(name, args)?;
                list_arg(name, &arg)?;
                Ok(arg)
            }
        },
        "reversed" => {
            let [arg] = one(name, args)?;
            let mut items = arg.into_items()?;
            items.reverse();
            Ok(Value::List(items))
        }
        "sorted" => {
            let [arg] = one(name, args)?;
            let mut items = arg.into_items()?;
            sort(&mut items)?;
            Ok(Value::List(items))
        }
        "sum" => {
            let (items, start) = match args.len() {
                1 | 2 => {
                    let mut args = args.into_iter();
                    let items = args.next().map(Value::into_items).unwrap_or_else(|| Ok(Vec::new()))?;
                    let start = match args.next() {
                        Some(start) => start.expect_int("sum() start")?,
                        None => 0,
                    };
                    (items, start)
                }
                n => return Err(arity(name, "1 or 2", n)),
            };
            items.iter().try_fold(start, |acc, item| {
                let v = item.expect_int("sum() element")?;
                acc.checked_add(v).ok_or_else(|| "integer overflow".to_string())
            })
            .map(Value::Int)
        }
        "min" | "max" => extreme(name, args),
        "abs" => {
            let [arg] = one(name, args)?;
            let v = arg.expect_int("abs() argument")?;
            v.checked_abs()
                .map(Value::Int)
                .ok_or_else(|| "integer overflow".to_string())
        }
        _ => Err(format!("name '{name}' is not defined")),
    }
}

/// Call `method` on `receiver`. Mutating methods return `None`.
pub fn call_method(
    receiver: &mut Value,
    method: &str,
    args: Vec<Value>,
) -> Result<Option<Value>, String> {
    let kind = receiver.type_name();
    let Value::List(items) = receiver else {
        return Err(format!("{kind} has no method '{method}'"));
    };

    match method {
        "append" => {
            let [item] = one(method, args)?;
            check_len(items.len() + 1)?;
            items.push(item);
            Ok(None)
        }
        "extend" => {
            let [more] = one(method, args)?;
            let more = more.into_items()?;
            check_len(items.len().saturating_add(more.len()))?;
            items.extend(more);
            Ok(None)
        }
        "reverse" => {
            if !args.is_empty() {
                return Err(arity(method, "0", args.len()));
            }
            items.reverse();
            Ok(None)
        }
        "index" => {
            let [needle] = one(method, args)?;
            items
                .iter()
                .position(|item| item.equals(&needle))
                .map(|i| Some(Value::Int(i as i64)))
                .ok_or_else(|| format!("{needle} is not in list"))
        }
        "count" => {
            let [needle] = one(method, args)?;
            let n = items.iter().filter(|item| item.equals(&needle)).count();
            Ok(Some(Value::Int(n as i64)))
        }
        _ => Err(format!("list has no method '{method}'")),
    }
}

fn range(args: &[Value]) -> Result<Value, String> {
    let ints = args
        .iter()
        .map(|a| a.expect_int("range() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        &[stop] => (0, stop, 1),
        &[start, stop] => (start, stop, 1),
        &[start, stop, step] => (start, stop, step),
        _ => return Err(arity("range", "1 to 3", args.len())),
    };
    if step == 0 {
        return Err("range() step must not be zero".to_string());
    }

    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let count = if step > 0 && start < stop {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    };
    if count > MAX_LIST_LEN as i128 {
        return Err(format!(
            "range of {count} elements exceeds the limit of {MAX_LIST_LEN}"
        ));
    }

    // Every element lies between start and stop, so it fits in an i64.
    let values = (0..count)
        .map(|k| Value::Int((start + k * step) as i64))
        .collect();
    Ok(Value::List(values))
}

fn extreme(name: &str, args: Vec<Value>) -> Result<Value, String> {
    let candidates = match args.len() {
        0 => return Err(arity(name, "at least 1", 0)),
        1 => args.into_iter().next().map(Value::into_items).unwrap_or_else(|| Ok(Vec::new()))?,
        _ => args,
    };

    let wanted = if name == "min" { Ordering::Less } else { Ordering::Greater };
    let mut best: Option<Value> = None;
    for item in candidates {
        best = match best {
            Some(current) if item.order(&current)? != wanted => Some(current),
            _ => Some(item),
        };
    }
    best.ok_or_else(|| format!("{name}() arg is an empty sequence"))
}

fn sort(items: &mut [Value]) -> Result<(), String> {
    let mut failure = None;
    items.sort_by(|a, b| {
        a.order(b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

fn one(name: &str, args: Vec<Value>) -> Result<[Value; 1], String> {
    let n = args.len();
    <[Value; 1]>::try_from(args).map_err(|_| arity(name, "1", n))
}

fn list_arg<'v>(name: &str, arg: &'v Value) -> Result<&'v [Value], String> {
    arg.as_list()
        .ok_or_else(|| format!("{name}() expects a list, not {}", arg.type_name()))
}

fn arity(name: &str, expected: &str, got: usize) -> String {
    format!("{name}() takes {expected} argument(s) but {got} were given")
}
