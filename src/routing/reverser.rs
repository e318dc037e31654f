//! Reverse routing: route name + arguments → concrete path or URL.

use std::sync::Arc;

use url::Url;

use crate::routing::handler::RouterHandler;
use crate::routing::macros::template::TemplateSegment;
use crate::routing::macros::Template;
use crate::routing::path::DYNAMIC_SUBDOMAIN;

/// An argument for [`PathReverser::path`]. Lists are flattened in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    Str(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    List(Vec<String>),
}

impl From<&str> for PathArg {
    fn from(v: &str) -> Self {
        PathArg::Str(v.to_string())
    }
}

impl From<String> for PathArg {
    fn from(v: String) -> Self {
        PathArg::Str(v)
    }
}

impl From<&String> for PathArg {
    fn from(v: &String) -> Self {
        PathArg::Str(v.clone())
    }
}

impl From<bool> for PathArg {
    fn from(v: bool) -> Self {
        PathArg::Bool(v)
    }
}

impl From<Vec<String>> for PathArg {
    fn from(v: Vec<String>) -> Self {
        PathArg::List(v)
    }
}

impl From<Vec<&str>> for PathArg {
    fn from(v: Vec<&str>) -> Self {
        PathArg::List(v.into_iter().map(str::to_string).collect())
    }
}

macro_rules! signed_arg {
    ($($t:ty),*) => {
        $(impl From<$t> for PathArg {
            fn from(v: $t) -> Self {
                PathArg::Int(v as i64)
            }
        })*
    };
}

macro_rules! unsigned_arg {
    ($($t:ty),*) => {
        $(impl From<$t> for PathArg {
            fn from(v: $t) -> Self {
                PathArg::Uint(v as u64)
            }
        })*
    };
}

signed_arg!(i8, i16, i32, i64, isize);
unsigned_arg!(u8, u16, u32, u64, usize);

fn flatten(args: &[PathArg]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            PathArg::Str(s) => out.push(s.clone()),
            PathArg::Int(v) => out.push(v.to_string()),
            PathArg::Uint(v) => out.push(v.to_string()),
            PathArg::Bool(v) => out.push(v.to_string()),
            PathArg::List(items) => out.extend(items.iter().cloned()),
        }
    }
    out
}

/// Substitutes `args` for the template's parameters, left to right.
///
/// A trailing path parameter takes every remaining argument, joined with
/// `/`. Returns `None` when the argument count does not fit.
pub fn build_path(template: &Template, args: &[String]) -> Option<String> {
    if template.is_static() {
        return Some(template.src.clone());
    }

    let n = template.params.len();
    let values: Vec<String> = if template.has_trailing_param() {
        if args.len() < n {
            return None;
        }
        let mut values = args[..n - 1].to_vec();
        values.push(args[n - 1..].join("/"));
        values
    } else {
        if args.len() != n {
            return None;
        }
        args.to_vec()
    };

    let mut out = String::new();
    for seg in &template.segments {
        out.push('/');
        match seg {
            TemplateSegment::Static(s) => out.push_str(s),
            TemplateSegment::Param(i) => out.push_str(&values[*i]),
        }
    }
    Some(out)
}

/// Builds paths and URLs against one built router snapshot.
#[derive(Debug, Clone)]
pub struct PathReverser {
    handler: Arc<RouterHandler>,
}

impl PathReverser {
    pub fn new(handler: Arc<RouterHandler>) -> Self {
        Self { handler }
    }

    /// The path of route `name` with `args` substituted, or `None` when the
    /// route is unknown or the arguments do not fit its template.
    pub fn path(&self, name: &str, args: &[PathArg]) -> Option<String> {
        let route = self.handler.lookup(name)?;
        build_path(route.template(), &flatten(args))
    }

    /// An absolute URL for route `name` using the configured scheme and
    /// vhost. For dynamic-subdomain routes the first argument is the
    /// subdomain label. Returns `None` without a vhost.
    pub fn url(&self, name: &str, args: &[PathArg]) -> Option<String> {
        let route = self.handler.lookup(name)?;
        let options = self.handler.options();
        let vhost = options.vhost.as_deref()?;
        let mut args = flatten(args);

        let host = match route.subdomain() {
            "" => vhost.to_string(),
            DYNAMIC_SUBDOMAIN => {
                if args.is_empty() {
                    return None;
                }
                let label = args.remove(0);
                format!("{}.{}", label, vhost)
            }
            sub => format!("{}{}", sub, vhost),
        };

        let path = build_path(route.template(), &args)?;
        let mut url = Url::parse(&format!("{}://{}", options.scheme, host)).ok()?;
        url.set_path(&path);
        Some(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::{ApiBuilder, Registrar};
    use crate::routing::handler::RouterOptions;

    fn reverser(vhost: Option<&str>) -> PathReverser {
        let mut api = ApiBuilder::new();
        api.get("/about", vec![]).unwrap().set_name("about");
        api.get("/user/{id:int}", vec![]).unwrap().set_name("user");
        api.get("/user/{id:int}/posts/{slug}", vec![]).unwrap().set_name("post");
        api.get("/files/{dir}/{rest:path}", vec![]).unwrap().set_name("files");
        api.get("admin./dashboard", vec![]).unwrap().set_name("admin");
        api.get("*./profile/{tab}", vec![]).unwrap().set_name("profile");
        let mode = api.mode();
        let (routes, _) = api.into_parts();
        let options = RouterOptions {
            vhost: vhost.map(str::to_string),
            ..RouterOptions::default()
        };
        let (handler, _) = RouterHandler::build(&routes, mode, options);
        PathReverser::new(Arc::new(handler))
    }

    #[test]
    fn test_static_path_ignores_arguments() {
        let r = reverser(None);
        assert_eq!(r.path("about", &[]).as_deref(), Some("/about"));
        assert_eq!(r.path("about", &["x".into()]).as_deref(), Some("/about"));
    }

    #[test]
    fn test_positional_substitution() {
        let r = reverser(None);
        assert_eq!(r.path("user", &[42.into()]).as_deref(), Some("/user/42"));
        assert_eq!(
            r.path("post", &[7u64.into(), "hello-world".into()]).as_deref(),
            Some("/user/7/posts/hello-world")
        );
    }

    #[test]
    fn test_trailing_param_joins_remaining_arguments() {
        let r = reverser(None);
        assert_eq!(
            r.path("files", &["docs".into(), "a".into(), "b".into(), "c.txt".into()]).as_deref(),
            Some("/files/docs/a/b/c.txt")
        );
        assert_eq!(
            r.path("files", &["docs".into(), vec!["x", "y"].into()]).as_deref(),
            Some("/files/docs/x/y")
        );
        assert_eq!(r.path("files", &["docs".into()]), None);
    }

    #[test]
    fn test_argument_mismatch_and_unknown_route() {
        let r = reverser(None);
        assert_eq!(r.path("user", &[]), None);
        assert_eq!(r.path("user", &[1.into(), 2.into()]), None);
        assert_eq!(r.path("nope", &[]), None);
    }

    #[test]
    fn test_bool_arguments() {
        let r = reverser(None);
        assert_eq!(r.path("user", &[true.into()]).as_deref(), Some("/user/true"));
    }

    #[test]
    fn test_url() {
        let r = reverser(Some("example.com:8080"));
        assert_eq!(
            r.url("user", &[5.into()]).as_deref(),
            Some("http://example.com:8080/user/5")
        );
        assert_eq!(
            r.url("admin", &[]).as_deref(),
            Some("http://admin.example.com:8080/dashboard")
        );
        assert_eq!(
            r.url("profile", &["alice".into(), "settings".into()]).as_deref(),
            Some("http://alice.example.com:8080/profile/settings")
        );
        assert_eq!(r.url("profile", &[]), None);
    }

    #[test]
    fn test_url_requires_vhost() {
        assert_eq!(reverser(None).url("about", &[]), None);
    }
}
