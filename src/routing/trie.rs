//! Segment trie, one per (method, subdomain).
//!
//! # Responsibilities
//! - Store compiled route paths as a tree of static, named and wildcard nodes
//! - Resolve a request path to a leaf plus the captured parameter values
//!
//! # Data Flow
//! ```text
//! insert: [Segment] → walk/create nodes → leaf (ordered alternates)
//! search: "/a/b/c" → static > named > wildcard per segment
//!         → dead end or non-terminal node → nearest ancestor wildcard
//!         → root wildcard fallback
//! ```
//!
//! # Design Decisions
//! - Nodes live in an arena (`Vec<Node>`) and refer to each other by index;
//!   the parent index is only used for the upward wildcard search.
//! - The walk never backs out of a static or named choice into a sibling;
//!   only wildcard ancestors are reconsidered.
//! - Read-only after build: `search` takes `&self` and allocates only the
//!   captured values.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

pub type NodeId = usize;

const ROOT: NodeId = 0;

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Segment {
    Static(String),
    /// Captures exactly one segment into the named parameter.
    Named(String),
    /// Captures the rest of the path, slashes included.
    Wildcard(String),
}

impl Segment {
    pub fn is_static(&self) -> bool {
        matches!(self, Segment::Static(_))
    }
}

/// Renders compiled segments, e.g. `/users/:id/*rest`.
pub fn display_path(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        match seg {
            Segment::Static(s) => out.push_str(s),
            Segment::Named(n) => {
                out.push(':');
                out.push_str(n);
            }
            Segment::Wildcard(n) => {
                out.push('*');
                out.push_str(n);
            }
        }
    }
    out
}

/// The literal text before the first parameter, with a trailing slash when
/// a parameter follows.
fn static_key(segments: &[Segment]) -> String {
    let mut out = String::from("/");
    for seg in segments {
        match seg {
            Segment::Static(s) => {
                if out.len() > 1 {
                    out.push('/');
                }
                out.push_str(s);
            }
            _ => {
                if out.len() > 1 {
                    out.push('/');
                }
                break;
            }
        }
    }
    out
}

/// A terminal node's payload: every route compiled to this exact path,
/// in the order they should be tried.
#[derive(Debug, Clone)]
pub struct Leaf<T> {
    static_key: String,
    alternates: Vec<T>,
    preferred: usize,
}

impl<T> Leaf<T> {
    /// Literal prefix before the first parameter. Informational: backtracking
    /// measures the wildcard remainder by segment depth instead.
    pub fn static_key(&self) -> &str {
        &self.static_key
    }

    pub fn alternates(&self) -> &[T] {
        &self.alternates
    }

    pub fn first(&self) -> Option<&T> {
        self.alternates.first()
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    parent: Option<NodeId>,
    depth: usize,
    statics: HashMap<String, NodeId>,
    named: Option<NodeId>,
    wildcard: Option<NodeId>,
    leaf: Option<Leaf<T>>,
}

impl<T> Node<T> {
    fn new(parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            parent,
            depth,
            statics: HashMap::new(),
            named: None,
            wildcard: None,
            leaf: None,
        }
    }
}

/// A successful search: the leaf and the raw captured values, in template order.
#[derive(Debug)]
pub struct TrieMatch<'a, T> {
    pub leaf: &'a Leaf<T>,
    pub values: Vec<String>,
}

#[derive(Clone)]
pub struct Trie<T> {
    method: String,
    subdomain: String,
    nodes: Vec<Node<T>>,
    has_root_slash: bool,
    has_root_wildcard: bool,
    leaves: usize,
}

impl<T> Trie<T> {
    pub fn new(method: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            subdomain: subdomain.into(),
            nodes: vec![Node::new(None, 0)],
            has_root_slash: false,
            has_root_wildcard: false,
            leaves: 0,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    /// Number of inserted values across all leaves.
    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    fn push_node(&mut self, parent: NodeId) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(Node::new(Some(parent), depth));
        self.nodes.len() - 1
    }

    /// Inserts `value` at the node for `segments`.
    ///
    /// `preferred` values are kept ahead of the others on the same leaf,
    /// each group in insertion order.
    pub fn insert(&mut self, segments: &[Segment], value: T, preferred: bool) {
        let mut n = ROOT;
        for seg in segments {
            n = match seg {
                Segment::Static(text) => match self.nodes[n].statics.get(text) {
                    Some(&child) => child,
                    None => {
                        let child = self.push_node(n);
                        self.nodes[n].statics.insert(text.clone(), child);
                        child
                    }
                },
                Segment::Named(_) => match self.nodes[n].named {
                    Some(child) => child,
                    None => {
                        let child = self.push_node(n);
                        self.nodes[n].named = Some(child);
                        child
                    }
                },
                Segment::Wildcard(_) => {
                    if n == ROOT {
                        self.has_root_wildcard = true;
                    }
                    match self.nodes[n].wildcard {
                        Some(child) => child,
                        None => {
                            let child = self.push_node(n);
                            self.nodes[n].wildcard = Some(child);
                            child
                        }
                    }
                }
            };
        }

        if n == ROOT {
            self.has_root_slash = true;
        }

        let leaf = self.nodes[n].leaf.get_or_insert_with(|| Leaf {
            static_key: static_key(segments),
            alternates: Vec::new(),
            preferred: 0,
        });
        if preferred {
            leaf.alternates.insert(leaf.preferred, value);
            leaf.preferred += 1;
        } else {
            leaf.alternates.push(value);
        }
        self.leaves += 1;
    }

    /// Returns the leaf stored for exactly these segments, if any.
    /// Parameter names are ignored.
    pub fn leaf(&self, segments: &[Segment]) -> Option<&Leaf<T>> {
        let mut n = ROOT;
        for seg in segments {
            let node = &self.nodes[n];
            n = match seg {
                Segment::Static(text) => *node.statics.get(text)?,
                Segment::Named(_) => node.named?,
                Segment::Wildcard(_) => node.wildcard?,
            };
        }
        self.nodes[n].leaf.as_ref()
    }

    /// Resolves a cleaned request path.
    pub fn search(&self, path: &str) -> Option<TrieMatch<'_, T>> {
        if path.is_empty() || path == "/" {
            return self.search_root();
        }

        let rest = path.strip_prefix('/').unwrap_or(path);
        let mut starts = Vec::new();
        let mut segs = Vec::new();
        let mut offset = 0;
        for seg in rest.split('/') {
            starts.push(offset);
            segs.push(seg);
            offset += seg.len() + 1;
        }

        // (segment index, value) so backtracking can drop captures made
        // below the ancestor it settles on
        let mut captured: Vec<(usize, String)> = Vec::new();
        let mut n = ROOT;
        let mut i = 0;
        while i < segs.len() {
            let node = &self.nodes[n];
            let seg = segs[i];
            if let Some(&child) = node.statics.get(seg) {
                n = child;
            } else if let Some(child) = node.named {
                captured.push((i, seg.to_string()));
                n = child;
            } else if let Some(child) = node.wildcard {
                captured.push((i, rest[starts[i]..].to_string()));
                n = child;
                break;
            } else {
                return self.backtrack(n, rest, &starts, captured);
            }
            i += 1;
        }

        match self.nodes[n].leaf.as_ref() {
            Some(leaf) => Some(TrieMatch {
                leaf,
                values: captured.into_iter().map(|(_, v)| v).collect(),
            }),
            None => self.backtrack(n, rest, &starts, captured),
        }
    }

    fn search_root(&self) -> Option<TrieMatch<'_, T>> {
        let root = &self.nodes[ROOT];
        if self.has_root_slash {
            if let Some(leaf) = root.leaf.as_ref() {
                return Some(TrieMatch {
                    leaf,
                    values: Vec::new(),
                });
            }
        }
        if self.has_root_wildcard {
            let leaf = root.wildcard.and_then(|w| self.nodes[w].leaf.as_ref())?;
            return Some(TrieMatch {
                leaf,
                values: vec![String::new()],
            });
        }
        None
    }

    /// Walks up from the parent of `from` to the nearest ancestor with a
    /// wildcard child. Named values captured above that ancestor are kept;
    /// the wildcard receives the path from the ancestor's depth onwards.
    fn backtrack(
        &self,
        from: NodeId,
        rest: &str,
        starts: &[usize],
        mut captured: Vec<(usize, String)>,
    ) -> Option<TrieMatch<'_, T>> {
        let mut cur = self.nodes[from].parent;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            if let Some(leaf) = node.wildcard.and_then(|w| self.nodes[w].leaf.as_ref()) {
                let depth = node.depth;
                captured.retain(|(i, _)| *i < depth);
                let mut values: Vec<String> = captured.into_iter().map(|(_, v)| v).collect();
                let remainder = starts.get(depth).and_then(|&s| rest.get(s..)).unwrap_or("");
                values.push(remainder.to_string());
                return Some(TrieMatch { leaf, values });
            }
            cur = node.parent;
        }

        if self.has_root_wildcard {
            let leaf = self.nodes[ROOT].wildcard.and_then(|w| self.nodes[w].leaf.as_ref())?;
            return Some(TrieMatch {
                leaf,
                values: vec![rest.to_string()],
            });
        }
        None
    }
}

impl<T> fmt::Debug for Trie<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trie")
            .field("method", &self.method)
            .field("subdomain", &self.subdomain)
            .field("nodes", &self.nodes.len())
            .field("leaves", &self.leaves)
            .field("has_root_slash", &self.has_root_slash)
            .field("has_root_wildcard", &self.has_root_wildcard)
            .finish()
    }
}
