//! Parsed route templates and the request-time validation handler.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::parser::{is_param_segment, parse_param, DEFAULT_PARAM_ERROR_CODE};
use super::{MacroError, MacroRegistry, ParamType, Validator};
use crate::routing::context::{handler, Handler, ParamValue};
use crate::routing::path::split_template;

/// One parameter of a template, resolved against a [`MacroRegistry`].
#[derive(Clone, Serialize)]
pub struct TemplateParam {
    /// The unparsed `{...}` source.
    pub src: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Position among the template's parameters.
    pub index: usize,
    pub error_code: u16,
    #[serde(skip)]
    validators: Vec<Validator>,
    #[serde(skip)]
    can_eval: bool,
}

impl TemplateParam {
    fn new(src: String, name: String, ty: ParamType, index: usize, error_code: u16, validators: Vec<Validator>) -> Self {
        // {name}, {name:string} and {name:path} without functions or an
        // else code never need a request-time check
        let can_eval = ty.has_evaluator() || !validators.is_empty() || error_code != DEFAULT_PARAM_ERROR_CODE;
        Self {
            src,
            name,
            ty,
            index,
            error_code,
            validators,
            can_eval,
        }
    }

    /// Reports whether this parameter has to be checked at request time.
    pub fn can_eval(&self) -> bool {
        self.can_eval
    }

    /// Runs the type check and then every function, in declaration order.
    /// Returns the converted value when all of them pass.
    pub fn eval(&self, raw: &str) -> Option<ParamValue> {
        let value = self.ty.evaluate(raw)?;
        self.validators
            .iter()
            .all(|v| v(raw, &value))
            .then_some(value)
    }
}

impl fmt::Debug for TemplateParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateParam")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("index", &self.index)
            .field("error_code", &self.error_code)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// A path segment of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TemplateSegment {
    Static(String),
    /// Index into [`Template::params`].
    Param(usize),
}

/// The parsed form of a registered path.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub src: String,
    pub params: Vec<TemplateParam>,
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parses a path template. Empty segments are ignored.
    ///
    /// Besides `{name:type ...}`, the shorthands `:name` (a string
    /// parameter) and `*name` (a path parameter) are accepted.
    pub fn parse(src: &str, registry: &MacroRegistry) -> Result<Template, MacroError> {
        let parts = split_template(src);
        let last = parts.len().saturating_sub(1);

        let mut params: Vec<TemplateParam> = Vec::new();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names = HashSet::new();

        for (i, part) in parts.iter().enumerate() {
            let param = if is_param_segment(part) {
                Some(parse_macro_segment(part, params.len(), registry)?)
            } else if let Some(name) = part.strip_prefix(':').filter(|n| !n.is_empty()) {
                Some(TemplateParam::new(
                    part.to_string(),
                    name.to_string(),
                    ParamType::String,
                    params.len(),
                    DEFAULT_PARAM_ERROR_CODE,
                    Vec::new(),
                ))
            } else if let Some(name) = part.strip_prefix('*').filter(|n| !n.is_empty()) {
                Some(TemplateParam::new(
                    part.to_string(),
                    name.to_string(),
                    ParamType::Path,
                    params.len(),
                    DEFAULT_PARAM_ERROR_CODE,
                    Vec::new(),
                ))
            } else {
                None
            };

            match param {
                Some(p) => {
                    if p.ty.is_trailing() && i != last {
                        return Err(MacroError::TrailingNotLast { src: p.src, ty: p.ty });
                    }
                    if !names.insert(p.name.clone()) {
                        return Err(MacroError::DuplicateName { name: p.name });
                    }
                    segments.push(TemplateSegment::Param(p.index));
                    params.push(p);
                }
                None => segments.push(TemplateSegment::Static(part.to_string())),
            }
        }

        Ok(Template {
            src: src.to_string(),
            params,
            segments,
        })
    }

    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }

    /// Reports whether the last parameter captures the rest of the path.
    pub fn has_trailing_param(&self) -> bool {
        self.params.last().is_some_and(|p| p.ty.is_trailing())
    }

    /// Reports whether a validation handler has to run before the route's handlers.
    pub fn needs_validation(&self) -> bool {
        self.params.iter().any(TemplateParam::can_eval)
    }

    /// The literal text before the first parameter.
    pub fn static_prefix(&self) -> String {
        let mut out = String::from("/");
        for seg in &self.segments {
            match seg {
                TemplateSegment::Static(s) => {
                    out.push_str(s);
                    out.push('/');
                }
                TemplateSegment::Param(_) => return out,
            }
        }
        if out.len() > 1 {
            out.pop();
        }
        out
    }
}

fn parse_macro_segment(part: &str, index: usize, registry: &MacroRegistry) -> Result<TemplateParam, MacroError> {
    let stmt = parse_param(part)?;

    let ty = match stmt.type_name.as_deref() {
        None => ParamType::String,
        Some(name) => ParamType::from_name(name).ok_or_else(|| MacroError::UnknownType {
            src: stmt.src.clone(),
            name: name.to_string(),
        })?,
    };

    let mut validators = Vec::with_capacity(stmt.funcs.len());
    for func in &stmt.funcs {
        match registry.build_func(ty, &func.name, &func.args) {
            Some(Ok(v)) => validators.push(v),
            Some(Err(reason)) => {
                return Err(MacroError::InvalidArgs {
                    src: stmt.src.clone(),
                    func: func.name.clone(),
                    reason,
                })
            }
            None => {
                return Err(MacroError::UnknownFunc {
                    src: stmt.src.clone(),
                    ty,
                    func: func.name.clone(),
                })
            }
        }
    }

    Ok(TemplateParam::new(stmt.src, stmt.name, ty, index, stmt.error_code, validators))
}

/// Builds the handler that validates and converts captured parameters.
///
/// Returns `None` when no parameter of the template needs a check, so
/// plain string routes carry no extra handler.
pub fn make_handler(template: &Template) -> Option<Handler> {
    if !template.needs_validation() {
        return None;
    }

    let params: Arc<[TemplateParam]> = template
        .params
        .iter()
        .filter(|p| p.can_eval())
        .cloned()
        .collect();

    Some(handler(move |ctx| {
        for p in params.iter() {
            let raw = match ctx.params().entry_at(p.index) {
                Some(entry) => entry.raw.clone(),
                None => {
                    ctx.reject(p.error_code);
                    return;
                }
            };
            match p.eval(&raw) {
                Some(value) => ctx.params_mut().set_value_at(p.index, value),
                None => {
                    tracing::debug!(
                        param = %p.name,
                        value = %raw,
                        status = p.error_code,
                        "Path parameter rejected"
                    );
                    ctx.reject(p.error_code);
                    return;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::context::Context;

    fn parse(src: &str) -> Result<Template, MacroError> {
        Template::parse(src, &MacroRegistry::new())
    }

    fn run(template: &Template, values: &[(&str, &str)]) -> Context {
        let mut ctx = Context::new("GET", "", "/");
        for (k, v) in values {
            ctx.params_mut().set(*k, *v);
        }
        if let Some(h) = make_handler(template) {
            ctx.do_handlers(&[h]);
        }
        ctx
    }

    #[test]
    fn test_static_template() {
        let t = parse("/about/team").unwrap();
        assert!(t.is_static());
        assert!(!t.needs_validation());
        assert_eq!(t.static_prefix(), "/about/team");
    }

    #[test]
    fn test_plain_string_params_need_no_handler() {
        let t = parse("/users/{name}/{rest:path}").unwrap();
        assert_eq!(t.params.len(), 2);
        assert!(make_handler(&t).is_none());
        assert_eq!(t.static_prefix(), "/users/");
    }

    #[test]
    fn test_else_code_alone_requires_handler() {
        let t = parse("/users/{name:string else 400}").unwrap();
        assert!(t.needs_validation());
    }

    #[test]
    fn test_shorthand_markers() {
        let t = parse("/hello/:name/*rest").unwrap();
        assert_eq!(t.params[0].ty, ParamType::String);
        assert_eq!(t.params[1].ty, ParamType::Path);
        assert!(t.has_trailing_param());
    }

    #[test]
    fn test_path_param_must_be_last() {
        assert!(matches!(
            parse("/files/{f:path}/edit"),
            Err(MacroError::TrailingNotLast { .. })
        ));
        assert!(matches!(
            parse("/files/*f/edit"),
            Err(MacroError::TrailingNotLast { .. })
        ));
    }

    #[test]
    fn test_unknown_function_is_an_error() {
        assert!(matches!(
            parse("/n/{n:int odd()}"),
            Err(MacroError::UnknownFunc { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(matches!(
            parse("/n/{n:uuid}"),
            Err(MacroError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_duplicate_param_names() {
        assert!(matches!(
            parse("/{a}/{a:int}"),
            Err(MacroError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_validator_chain_short_circuits() {
        let t = parse("/n/{n:int min(10) max(20)}").unwrap();
        assert_eq!(run(&t, &[("n", "5")]).status().as_u16(), 404);
        assert_eq!(run(&t, &[("n", "25")]).status().as_u16(), 404);

        let ok = run(&t, &[("n", "15")]);
        assert!(!ok.is_stopped());
        assert_eq!(ok.params().get_i64("n"), Some(15));
    }

    #[test]
    fn test_custom_error_code() {
        let t = parse("/n/{id:uint64 min(1) else 400}").unwrap();
        let ctx = run(&t, &[("id", "0")]);
        assert!(ctx.is_rejected());
        assert_eq!(ctx.status().as_u16(), 400);
    }

    #[test]
    fn test_non_numeric_int_is_rejected() {
        let t = parse("/user/{id:int}").unwrap();
        let ctx = run(&t, &[("id", "abc")]);
        assert!(ctx.is_stopped());
        assert_eq!(ctx.status().as_u16(), 404);
    }
}
