//! Typed path parameters.
//!
//! A parameter segment such as `{id:uint64 min(1) else 400}` names a
//! parameter, gives it a type, attaches validator functions and overrides
//! the status written when validation fails.
//!
//! # Data Flow
//! ```text
//! "{id:int min(1) else 400}"
//!     → lexer.rs (tokens)
//!     → parser.rs (ParamStatement)
//!     → template.rs (TemplateParam: type evaluator + validators, resolved
//!       against an immutable MacroRegistry)
//!     → validation handler prepended to the route chain when needed
//! ```
//!
//! # Design Decisions
//! - The registry is built once and never mutated; tests build their own.
//! - Plain string parameters without functions cost nothing at request time.
//! - A function unknown to the declared type falls back to the string
//!   type's function of the same name, applied to the raw value.

pub mod lexer;
pub mod parser;
pub mod template;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::routing::context::ParamValue;

pub use parser::DEFAULT_PARAM_ERROR_CODE;
pub use template::{Template, TemplateParam};

/// Errors produced while parsing a template or resolving its functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("{src}: parameter name is missing")]
    MissingName { src: String },

    #[error("{src}: unexpected parameter type {name:?}")]
    UnknownType { src: String, name: String },

    #[error("{src}: unknown function {func:?} for parameter type {ty}")]
    UnknownFunc { src: String, ty: ParamType, func: String },

    #[error("{src}: invalid arguments for {func}: {reason}")]
    InvalidArgs {
        src: String,
        func: String,
        reason: String,
    },

    #[error("{src}: expected an HTTP status code after 'else' but got {literal:?}")]
    InvalidErrorCode { src: String, literal: String },

    #[error("{src}: [{pos}] {msg}")]
    Syntax { src: String, pos: usize, msg: String },

    #[error("{src}: parameter type {ty} must be the last segment of the path")]
    TrailingNotLast { src: String, ty: ParamType },

    #[error("parameter name {name:?} is used more than once")]
    DuplicateName { name: String },
}

/// The built-in parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Any single segment. The default when no type is written.
    String,
    /// Signed 64-bit integer.
    Int,
    /// Signed 64-bit integer, also spelled `long`.
    Int64,
    /// 0 to 255.
    Uint8,
    /// 0 to 18446744073709551615.
    Uint64,
    /// `1 t T TRUE true True 0 f F FALSE false False`, also spelled `boolean`.
    Bool,
    /// Letters and spaces only.
    Alphabetical,
    /// Letters, digits, `_`, `.` and `-`.
    File,
    /// The rest of the path, slashes included. Must be last.
    Path,
}

impl ParamType {
    pub const ALL: [ParamType; 9] = [
        ParamType::String,
        ParamType::Int,
        ParamType::Int64,
        ParamType::Uint8,
        ParamType::Uint64,
        ParamType::Bool,
        ParamType::Alphabetical,
        ParamType::File,
        ParamType::Path,
    ];

    pub fn ident(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Int64 => "int64",
            ParamType::Uint8 => "uint8",
            ParamType::Uint64 => "uint64",
            ParamType::Bool => "bool",
            ParamType::Alphabetical => "alphabetical",
            ParamType::File => "file",
            ParamType::Path => "path",
        }
    }

    pub fn alias(self) -> Option<&'static str> {
        match self {
            ParamType::Int64 => Some("long"),
            ParamType::Bool => Some("boolean"),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.ident() == name || t.alias() == Some(name))
    }

    /// Trailing types capture the remainder of the path.
    pub fn is_trailing(self) -> bool {
        self == ParamType::Path
    }

    /// Converts a raw segment, or returns `None` when it is not of this type.
    /// Types without a check (string, path) always pass.
    pub fn evaluate(self, raw: &str) -> Option<ParamValue> {
        match self {
            ParamType::String | ParamType::Path => Some(ParamValue::Str(raw.to_string())),
            ParamType::Int | ParamType::Int64 => {
                if !is_simple_number(raw) {
                    return None;
                }
                raw.parse::<i64>().ok().map(ParamValue::Int)
            }
            ParamType::Uint8 => {
                if !is_digits(raw) {
                    return None;
                }
                raw.parse::<u8>().ok().map(|v| ParamValue::Uint(u64::from(v)))
            }
            ParamType::Uint64 => {
                if !is_digits(raw) {
                    return None;
                }
                raw.parse::<u64>().ok().map(ParamValue::Uint)
            }
            ParamType::Bool => parse_bool(raw).map(ParamValue::Bool),
            ParamType::Alphabetical => {
                let ok = !raw.is_empty() && raw.bytes().all(|c| c.is_ascii_alphabetic() || c == b' ');
                ok.then(|| ParamValue::Str(raw.to_string()))
            }
            ParamType::File => {
                let ok = raw
                    .bytes()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b'-'));
                ok.then(|| ParamValue::Str(raw.to_string()))
            }
        }
    }

    /// Reports whether the type itself checks the value.
    pub fn has_evaluator(self) -> bool {
        !matches!(self, ParamType::String | ParamType::Path)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit())
}

fn is_simple_number(s: &str) -> bool {
    is_digits(s.strip_prefix('-').unwrap_or(s))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// A compiled validator. Receives the raw segment and its converted value.
pub type Validator = Arc<dyn Fn(&str, &ParamValue) -> bool + Send + Sync>;

/// Builds a validator from the literal arguments written in the template.
pub type FuncBuilder = Arc<dyn Fn(&[String]) -> Result<Validator, String> + Send + Sync>;

#[derive(Clone, Default)]
struct Macro {
    funcs: HashMap<String, FuncBuilder>,
}

/// Immutable set of parameter functions per type.
#[derive(Clone)]
pub struct MacroRegistry {
    macros: HashMap<ParamType, Macro>,
}

impl MacroRegistry {
    /// A registry holding only the built-in functions.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A builder pre-populated with the built-in functions.
    pub fn builder() -> MacroRegistryBuilder {
        MacroRegistryBuilder::with_defaults()
    }

    /// Resolves `func` for parameters of type `ty` and builds its validator.
    ///
    /// Returns `None` when neither `ty` nor the string type know `func`.
    pub fn build_func(
        &self,
        ty: ParamType,
        func: &str,
        args: &[String],
    ) -> Option<Result<Validator, String>> {
        let builder = self
            .macros
            .get(&ty)
            .and_then(|m| m.funcs.get(func))
            .or_else(|| {
                self.macros
                    .get(&ParamType::String)
                    .and_then(|m| m.funcs.get(func))
            })?;
        Some(builder(args))
    }

    pub fn has_func(&self, ty: ParamType, func: &str) -> bool {
        self.macros
            .get(&ty)
            .is_some_and(|m| m.funcs.contains_key(func))
    }
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ty in ParamType::ALL {
            if let Some(m) = self.macros.get(&ty) {
                let mut names: Vec<_> = m.funcs.keys().collect();
                names.sort();
                map.entry(&ty.ident(), &names);
            }
        }
        map.finish()
    }
}

/// Collects functions before freezing them into a [`MacroRegistry`].
pub struct MacroRegistryBuilder {
    macros: HashMap<ParamType, Macro>,
}

impl MacroRegistryBuilder {
    /// A builder with no functions at all.
    pub fn empty() -> Self {
        Self {
            macros: ParamType::ALL.into_iter().map(|t| (t, Macro::default())).collect(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut b = Self::empty();

        b = b
            .func(ParamType::String, "regexp", |args| {
                // commas inside the expression were split by the parser
                let expr = args.join(",");
                let re = compile_anchored(&expr)?;
                Ok(Arc::new(move |raw: &str, _: &ParamValue| re.is_match(raw)) as Validator)
            })
            .func(ParamType::String, "prefix", |args| {
                let p = one_arg(args)?.to_string();
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw.starts_with(&p)) as Validator)
            })
            .func(ParamType::String, "suffix", |args| {
                let s = one_arg(args)?.to_string();
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw.ends_with(&s)) as Validator)
            })
            .func(ParamType::String, "contains", |args| {
                let s = one_arg(args)?.to_string();
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw.contains(&s)) as Validator)
            })
            .func(ParamType::String, "min", |args| {
                let min: usize = parse_arg(one_arg(args)?)?;
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw.chars().count() >= min) as Validator)
            })
            .func(ParamType::String, "max", |args| {
                let max: usize = parse_arg(one_arg(args)?)?;
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw.chars().count() <= max) as Validator)
            })
            .func(ParamType::String, "eq", |args| {
                let s = one_arg(args)?.to_string();
                Ok(Arc::new(move |raw: &str, _: &ParamValue| raw == s) as Validator)
            })
            .func(ParamType::String, "eqor", |args| {
                if args.is_empty() {
                    return Err("expected at least one argument".into());
                }
                let texts = args.to_vec();
                Ok(Arc::new(move |raw: &str, _: &ParamValue| texts.iter().any(|t| t == raw)) as Validator)
            });

        for ty in [ParamType::Int, ParamType::Int64] {
            b = b
                .func(ty, "min", |args| {
                    let min: i64 = parse_arg(one_arg(args)?)?;
                    Ok(Arc::new(move |_: &str, v: &ParamValue| matches!(v, ParamValue::Int(x) if *x >= min)) as Validator)
                })
                .func(ty, "max", |args| {
                    let max: i64 = parse_arg(one_arg(args)?)?;
                    Ok(Arc::new(move |_: &str, v: &ParamValue| matches!(v, ParamValue::Int(x) if *x <= max)) as Validator)
                })
                .func(ty, "range", |args| {
                    let (min, max): (i64, i64) = two_args(args)?;
                    Ok(Arc::new(move |_: &str, v: &ParamValue| {
                        matches!(v, ParamValue::Int(x) if (min..=max).contains(x))
                    }) as Validator)
                });
        }

        for (ty, limit) in [(ParamType::Uint8, u64::from(u8::MAX)), (ParamType::Uint64, u64::MAX)] {
            b = b
                .func(ty, "min", move |args| {
                    let min = bounded(parse_arg(one_arg(args)?)?, limit)?;
                    Ok(Arc::new(move |_: &str, v: &ParamValue| matches!(v, ParamValue::Uint(x) if *x >= min)) as Validator)
                })
                .func(ty, "max", move |args| {
                    let max = bounded(parse_arg(one_arg(args)?)?, limit)?;
                    Ok(Arc::new(move |_: &str, v: &ParamValue| matches!(v, ParamValue::Uint(x) if *x <= max)) as Validator)
                })
                .func(ty, "range", move |args| {
                    let (min, max): (u64, u64) = two_args(args)?;
                    let (min, max) = (bounded(min, limit)?, bounded(max, limit)?);
                    Ok(Arc::new(move |_: &str, v: &ParamValue| {
                        matches!(v, ParamValue::Uint(x) if (min..=max).contains(x))
                    }) as Validator)
                });
        }

        b
    }

    /// Registers (or replaces) a function for parameters of type `ty`.
    pub fn func<F>(mut self, ty: ParamType, name: &str, builder: F) -> Self
    where
        F: Fn(&[String]) -> Result<Validator, String> + Send + Sync + 'static,
    {
        if !is_valid_func_name(name) {
            tracing::warn!(func = name, "Ignoring macro function with an invalid name");
            return self;
        }
        self.macros
            .entry(ty)
            .or_default()
            .funcs
            .insert(name.to_string(), Arc::new(builder));
        self
    }

    pub fn build(self) -> MacroRegistry {
        MacroRegistry {
            macros: self.macros,
        }
    }
}

fn is_valid_func_name(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn compile_anchored(expr: &str) -> Result<Regex, String> {
    if expr.is_empty() {
        return Err("empty regular expression".into());
    }
    // anchor the end unless the author already did
    let expr = if expr.ends_with('$') || expr.ends_with('*') {
        expr.to_string()
    } else {
        format!("{}$", expr)
    };
    Regex::new(&expr).map_err(|e| e.to_string())
}

fn one_arg(args: &[String]) -> Result<&str, String> {
    match args {
        [a] => Ok(a.as_str()),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn two_args<T: std::str::FromStr>(args: &[String]) -> Result<(T, T), String> {
    match args {
        [a, b] => Ok((parse_arg(a)?, parse_arg(b)?)),
        _ => Err(format!("expected 2 arguments, got {}", args.len())),
    }
}

fn parse_arg<T: std::str::FromStr>(arg: &str) -> Result<T, String> {
    arg.parse()
        .map_err(|_| format!("{:?} is not a valid {}", arg, std::any::type_name::<T>()))
}

fn bounded(v: u64, limit: u64) -> Result<u64, String> {
    if v > limit {
        Err(format!("{} exceeds {}", v, limit))
    } else {
        Ok(v)
    }
}
