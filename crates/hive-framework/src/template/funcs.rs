//! Built-in template functions.
//!
//! Comparison and logic builtins (`eq`, `and`, `len`, ...) plus the string
//! helpers available to action options and filters (`Left`, `Split`,
//! `Matches`, `ToLower`, ...).

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use hive_core::Value;
use regex::Regex;

use crate::error::{TemplateError, TemplateResult};

type Func = fn(&[Value]) -> TemplateResult<Value>;

/// Longest string `Repeat` may produce, in bytes.
const MAX_REPEAT_LEN: usize = 1 << 20;

static FUNCS: LazyLock<HashMap<&'static str, Func>> = LazyLock::new(|| {
    let entries: [(&'static str, Func); 39] = [
        // Builtins
        ("and", and),
        ("or", or),
        ("not", not),
        ("eq", eq),
        ("ne", ne),
        ("lt", lt),
        ("le", le),
        ("gt", gt),
        ("ge", ge),
        ("len", len),
        ("index", index),
        ("print", print),
        // Substrings
        ("Left", left),
        ("Mid", mid),
        ("Right", right),
        ("Split", split),
        ("Last", last),
        ("Join", join),
        ("Matches", matches),
        ("Json", json),
        // strings package
        ("Contains", |args| {
            let [s, sub] = strings("Contains", args)?;
            Ok(Value::Bool(s.contains(&*sub)))
        }),
        ("ContainsAny", |args| {
            let [s, chars] = strings("ContainsAny", args)?;
            Ok(Value::Bool(s.chars().any(|c| chars.contains(c))))
        }),
        ("Count", |args| {
            let [s, sub] = strings("Count", args)?;
            Ok(Value::Int(s.matches(&*sub).count() as i64))
        }),
        ("EqualFold", |args| {
            let [a, b] = strings("EqualFold", args)?;
            Ok(Value::Bool(a.to_lowercase() == b.to_lowercase()))
        }),
        ("HasPrefix", |args| {
            let [s, prefix] = strings("HasPrefix", args)?;
            Ok(Value::Bool(s.starts_with(&*prefix)))
        }),
        ("HasSuffix", |args| {
            let [s, suffix] = strings("HasSuffix", args)?;
            Ok(Value::Bool(s.ends_with(&*suffix)))
        }),
        ("Index", |args| {
            let [s, sub] = strings("Index", args)?;
            Ok(Value::Int(s.find(&*sub).map_or(-1, |i| i as i64)))
        }),
        ("LastIndex", |args| {
            let [s, sub] = strings("LastIndex", args)?;
            Ok(Value::Int(s.rfind(&*sub).map_or(-1, |i| i as i64)))
        }),
        ("Repeat", |args| {
            arity("Repeat", args, 2)?;
            let count = usize::try_from(int_arg("Repeat", args, 1)?)
                .map_err(|_| TemplateError::exec("Repeat: negative count"))?;
            let text = text_arg("Repeat", args, 0)?;
            match text.len().checked_mul(count) {
                Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::String(text.repeat(count))),
                _ => Err(TemplateError::exec(format!(
                    "Repeat: result exceeds {MAX_REPEAT_LEN} bytes"
                ))),
            }
        }),
        ("Replace", |args| {
            arity("Replace", args, 4)?;
            let s = text_arg("Replace", args, 0)?;
            let old = text_arg("Replace", args, 1)?;
            let new = text_arg("Replace", args, 2)?;
            let n = int_arg("Replace", args, 3)?;
            Ok(Value::String(match usize::try_from(n) {
                Ok(n) => s.replacen(&*old, &new, n),
                Err(_) => s.replace(&*old, &new),
            }))
        }),
        ("ToLower", |args| {
            let [s] = strings("ToLower", args)?;
            Ok(Value::String(s.to_lowercase()))
        }),
        ("ToUpper", |args| {
            let [s] = strings("ToUpper", args)?;
            Ok(Value::String(s.to_uppercase()))
        }),
        ("Title", |args| {
            let [s] = strings("Title", args)?;
            Ok(Value::String(title(&s)))
        }),
        ("Trim", |args| {
            let [s, cutset] = strings("Trim", args)?;
            Ok(Value::String(s.trim_matches(|c: char| cutset.contains(c)).to_string()))
        }),
        ("TrimLeft", |args| {
            let [s, cutset] = strings("TrimLeft", args)?;
            Ok(Value::String(s.trim_start_matches(|c: char| cutset.contains(c)).to_string()))
        }),
        ("TrimRight", |args| {
            let [s, cutset] = strings("TrimRight", args)?;
            Ok(Value::String(s.trim_end_matches(|c: char| cutset.contains(c)).to_string()))
        }),
        ("TrimPrefix", |args| {
            let [s, prefix] = strings("TrimPrefix", args)?;
            Ok(Value::String(
                s.strip_prefix(&*prefix).unwrap_or(&*s).to_string(),
            ))
        }),
        ("TrimSuffix", |args| {
            let [s, suffix] = strings("TrimSuffix", args)?;
            Ok(Value::String(
                s.strip_suffix(&*suffix).unwrap_or(&*s).to_string(),
            ))
        }),
        ("TrimSpace", |args| {
            let [s] = strings("TrimSpace", args)?;
            Ok(Value::String(s.trim().to_string()))
        }),
    ];
    entries.into_iter().collect()
});

/// Calls the function `name` with already evaluated arguments.
pub(crate) fn call(name: &str, args: &[Value]) -> TemplateResult<Value> {
    let func = FUNCS
        .get(name)
        .ok_or_else(|| TemplateError::UnknownFunction(name.to_string()))?;
    func(args)
}

// =============================================================================
// Argument helpers
// =============================================================================

fn arity(name: &str, args: &[Value], expected: usize) -> TemplateResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(TemplateError::Arity {
            name: name.to_string(),
            expected: expected.to_string(),
            got: args.len(),
        })
    }
}

/// Scalars are accepted wherever text is expected.
fn text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => Some(Cow::Owned(value.to_string())),
        _ => None,
    }
}

fn text_arg<'a>(name: &str, args: &'a [Value], i: usize) -> TemplateResult<Cow<'a, str>> {
    text(&args[i]).ok_or_else(|| {
        TemplateError::exec(format!(
            "{name}: argument {} must be a string, got {}",
            i + 1,
            args[i].type_name()
        ))
    })
}

fn int_arg(name: &str, args: &[Value], i: usize) -> TemplateResult<i64> {
    match &args[i] {
        Value::Int(n) => Ok(*n),
        Value::String(s) => s.trim().parse().map_err(|_| {
            TemplateError::exec(format!("{name}: argument {} must be an integer", i + 1))
        }),
        other => Err(TemplateError::exec(format!(
            "{name}: argument {} must be an integer, got {}",
            i + 1,
            other.type_name()
        ))),
    }
}

/// Checks arity and converts every argument to text.
fn strings<'a, const N: usize>(name: &str, args: &'a [Value]) -> TemplateResult<[Cow<'a, str>; N]> {
    arity(name, args, N)?;
    let mut converted = Vec::with_capacity(N);
    for i in 0..N {
        converted.push(text_arg(name, args, i)?);
    }
    converted
        .try_into()
        .map_err(|_| TemplateError::exec(format!("{name}: argument conversion failed")))
}

// =============================================================================
// Builtins
// =============================================================================

fn and(args: &[Value]) -> TemplateResult<Value> {
    if args.is_empty() {
        return Err(arity_at_least("and", 1, 0));
    }
    Ok(args
        .iter()
        .find(|v| !v.is_truthy())
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

fn or(args: &[Value]) -> TemplateResult<Value> {
    if args.is_empty() {
        return Err(arity_at_least("or", 1, 0));
    }
    Ok(args
        .iter()
        .find(|v| v.is_truthy())
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

fn not(args: &[Value]) -> TemplateResult<Value> {
    arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn arity_at_least(name: &str, min: usize, got: usize) -> TemplateError {
    TemplateError::Arity {
        name: name.to_string(),
        expected: format!("at least {min}"),
        got,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn eq(args: &[Value]) -> TemplateResult<Value> {
    if args.len() < 2 {
        return Err(arity_at_least("eq", 2, args.len()));
    }
    Ok(Value::Bool(args[1..].iter().any(|b| values_equal(&args[0], b))))
}

fn ne(args: &[Value]) -> TemplateResult<Value> {
    arity("ne", args, 2)?;
    Ok(Value::Bool(!values_equal(&args[0], &args[1])))
}

fn compare(name: &str, args: &[Value]) -> TemplateResult<Ordering> {
    arity(name, args, 2)?;
    let ordering = match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        TemplateError::exec(format!(
            "{name}: incompatible types for comparison: {} and {}",
            args[0].type_name(),
            args[1].type_name()
        ))
    })
}

fn lt(args: &[Value]) -> TemplateResult<Value> {
    compare("lt", args).map(|o| Value::Bool(o == Ordering::Less))
}

fn le(args: &[Value]) -> TemplateResult<Value> {
    compare("le", args).map(|o| Value::Bool(o != Ordering::Greater))
}

fn gt(args: &[Value]) -> TemplateResult<Value> {
    compare("gt", args).map(|o| Value::Bool(o == Ordering::Greater))
}

fn ge(args: &[Value]) -> TemplateResult<Value> {
    compare("ge", args).map(|o| Value::Bool(o != Ordering::Less))
}

fn len(args: &[Value]) -> TemplateResult<Value> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::Binary(b) => b.len(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(TemplateError::exec(format!(
                "len of type {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(n as i64))
}

fn index(args: &[Value]) -> TemplateResult<Value> {
    let Some((mut current, keys)) = args.split_first() else {
        return Err(arity_at_least("index", 1, 0));
    };
    for key in keys {
        current = match (current, key) {
            (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| TemplateError::exec(format!("index out of range: {i}")))?,
            (Value::Map(map), key) => {
                let key = text(key).ok_or_else(|| {
                    TemplateError::exec(format!("cannot index map with {}", key.type_name()))
                })?;
                match map.get(&*key) {
                    Some(value) => value,
                    None => return Ok(Value::Null),
                }
            }
            (container, key) => {
                return Err(TemplateError::exec(format!(
                    "can't index item of type {} with {}",
                    container.type_name(),
                    key.type_name()
                )));
            }
        };
    }
    Ok(current.clone())
}

fn print(args: &[Value]) -> TemplateResult<Value> {
    let mut out = String::new();
    for (i, value) in args.iter().enumerate() {
        let is_text = matches!(value, Value::String(_));
        if i > 0 && !is_text && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&value.to_string());
    }
    Ok(Value::String(out))
}

// =============================================================================
// Helpers
// =============================================================================

fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn non_negative(name: &str, n: i64) -> TemplateResult<usize> {
    usize::try_from(n).map_err(|_| TemplateError::exec(format!("{name}: negative index {n}")))
}

fn left(args: &[Value]) -> TemplateResult<Value> {
    arity("Left", args, 2)?;
    let s = text_arg("Left", args, 0)?;
    let n = non_negative("Left", int_arg("Left", args, 1)?)?;
    Ok(Value::String(char_slice(&s, 0, n)))
}

fn mid(args: &[Value]) -> TemplateResult<Value> {
    if !(2..=3).contains(&args.len()) {
        return Err(TemplateError::Arity {
            name: "Mid".to_string(),
            expected: "2 or 3".to_string(),
            got: args.len(),
        });
    }
    let s = text_arg("Mid", args, 0)?;
    let start = non_negative("Mid", int_arg("Mid", args, 1)?)?;
    let end = match args.len() {
        3 => non_negative("Mid", int_arg("Mid", args, 2)?)?,
        _ => s.chars().count(),
    };
    Ok(Value::String(char_slice(&s, start, end)))
}

fn right(args: &[Value]) -> TemplateResult<Value> {
    arity("Right", args, 2)?;
    let s = text_arg("Right", args, 0)?;
    let n = non_negative("Right", int_arg("Right", args, 1)?)?;
    let total = s.chars().count();
    Ok(Value::String(char_slice(&s, total.saturating_sub(n), total)))
}

fn split(args: &[Value]) -> TemplateResult<Value> {
    let [s, sep] = strings("Split", args)?;
    let parts: Vec<String> = if sep.is_empty() {
        s.chars().map(String::from).collect()
    } else {
        s.split(&*sep).map(str::to_string).collect()
    };
    Ok(Value::from(parts))
}

fn last(args: &[Value]) -> TemplateResult<Value> {
    arity("Last", args, 1)?;
    match &args[0] {
        Value::List(items) => Ok(items.last().cloned().unwrap_or_default()),
        other => Err(TemplateError::exec(format!(
            "Last: expected a list, got {}",
            other.type_name()
        ))),
    }
}

fn join(args: &[Value]) -> TemplateResult<Value> {
    arity("Join", args, 2)?;
    let sep = text_arg("Join", args, 1)?;
    match &args[0] {
        Value::List(items) => Ok(Value::String(
            items
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&sep),
        )),
        other => Err(TemplateError::exec(format!(
            "Join: expected a list, got {}",
            other.type_name()
        ))),
    }
}

fn matches(args: &[Value]) -> TemplateResult<Value> {
    let [s, pattern] = strings("Matches", args)?;
    let regex = Regex::new(&pattern)
        .map_err(|e| TemplateError::exec(format!("Matches: invalid pattern: {e}")))?;
    Ok(Value::Bool(regex.is_match(&s)))
}

fn json(args: &[Value]) -> TemplateResult<Value> {
    arity("Json", args, 1)?;
    serde_json::to_string(&args[0].to_json())
        .map(Value::String)
        .map_err(|e| TemplateError::exec(format!("Json: {e}")))
}

fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}
