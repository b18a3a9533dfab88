use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::kind::{KindClass, KindRef};
use crate::value::Value;

/// One element of a compiled template tree.
///
/// A node is either a leaf wrapping exactly one [`Value`] (literals) or a
/// structural node wrapping a [`NodeKind`](crate::NodeKind) and an ordered,
/// exclusively owned list of children (every syntactic construct). Children
/// are owned directly, so replacing a node with one of its own descendants is
/// an ordinary move — see [`TreeNode::replace_with_child`].
///
/// A finished tree is read-only: render never mutates shape or payloads, and
/// the same tree may be traversed by concurrent render calls. Optimize and
/// compile are mutating passes the embedding host must not run concurrently
/// with render.
#[derive(Clone)]
pub struct TreeNode<'s> {
    /// Source position, for diagnostics.
    pub line: u32,
    pub column: u32,
    payload: Payload<'s>,
}

#[derive(Clone)]
enum Payload<'s> {
    Leaf(Value<'s>),
    Structural {
        kind: KindRef,
        children: Vec<TreeNode<'s>>,
    },
}

impl<'s> TreeNode<'s> {
    /// Creates a literal leaf.
    pub fn leaf(value: impl Into<Value<'s>>) -> Self {
        TreeNode {
            line: 0,
            column: 0,
            payload: Payload::Leaf(value.into()),
        }
    }

    /// Creates a structural node of the given kind.
    pub fn structural(kind: KindRef, children: Vec<TreeNode<'s>>) -> Self {
        TreeNode {
            line: 0,
            column: 0,
            payload: Payload::Structural { kind, children },
        }
    }

    /// Attaches a source position.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        matches!(self.payload, Payload::Leaf(_))
    }

    /// The kind tag of a structural node, `None` for leaves.
    pub fn kind(&self) -> Option<&KindRef> {
        match &self.payload {
            Payload::Leaf(_) => None,
            Payload::Structural { kind, .. } => Some(kind),
        }
    }

    /// The literal value of a leaf, `None` for structural nodes.
    pub fn value(&self) -> Option<&Value<'s>> {
        match &self.payload {
            Payload::Leaf(value) => Some(value),
            Payload::Structural { .. } => None,
        }
    }

    /// The literal value of a leaf.
    ///
    /// # Panics
    ///
    /// Panics when called on a structural node. That is a caller contract
    /// violation, not a template-authoring error.
    pub fn literal_value(&self) -> &Value<'s> {
        match &self.payload {
            Payload::Leaf(value) => value,
            Payload::Structural { kind, .. } => {
                panic!("literal_value called on structural node `{}`", kind.symbol())
            }
        }
    }

    /// Consumes a leaf and yields its value.
    ///
    /// # Panics
    ///
    /// Panics when called on a structural node, like [`TreeNode::literal_value`].
    pub fn into_value(self) -> Value<'s> {
        match self.payload {
            Payload::Leaf(value) => value,
            Payload::Structural { kind, .. } => {
                panic!("into_value called on structural node `{}`", kind.symbol())
            }
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, idx: usize) -> Option<&TreeNode<'s>> {
        self.children().get(idx)
    }

    /// Children of a structural node; empty for leaves.
    pub fn children(&self) -> &[TreeNode<'s>] {
        match &self.payload {
            Payload::Leaf(_) => &[],
            Payload::Structural { children, .. } => children,
        }
    }

    /// Mutable children, for the host's optimize driver. Must not be used
    /// while renders of this tree are in flight.
    pub fn children_mut(&mut self) -> &mut [TreeNode<'s>] {
        match &mut self.payload {
            Payload::Leaf(_) => &mut [],
            Payload::Structural { children, .. } => children,
        }
    }

    /// The node holding this node's operand list.
    ///
    /// Some syntactic forms keep their operands one level down inside a
    /// dedicated `Arguments`-class child so validation and rendering can see
    /// the list boundary; most keep operands as direct children. The argument
    /// accessors unwrap the indirection so every kind treats its operands
    /// uniformly.
    fn arguments_node(&self) -> &TreeNode<'s> {
        match self.children() {
            [first, ..] if first.kind().map(|k| k.class()) == Some(KindClass::Arguments) => first,
            _ => self,
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments_node().child_count()
    }

    pub fn argument(&self, idx: usize) -> Option<&TreeNode<'s>> {
        self.arguments_node().child(idx)
    }

    /// Replaces this node with its `idx`-th child, dropping the rest of the
    /// subtree. Used when a reduction collapses a wrapper onto one of its own
    /// descendants.
    ///
    /// # Panics
    ///
    /// Panics on leaves and on out-of-range indices.
    pub fn replace_with_child(&mut self, idx: usize) {
        let Payload::Structural { children, .. } = &mut self.payload else {
            panic!("replace_with_child called on a leaf node");
        };
        assert!(
            idx < children.len(),
            "replace_with_child index {idx} out of range ({} children)",
            children.len()
        );
        let child = children.swap_remove(idx);
        *self = child;
    }

    /// Pre-order, depth-first traversal invoking `visitor` on this node and
    /// every descendant. Each call walks fresh; the visitor cannot change
    /// tree shape.
    pub fn walk(&self, visitor: &mut impl FnMut(&TreeNode<'s>)) {
        visitor(self);
        for child in self.children() {
            child.walk(visitor);
        }
    }
}

/// Equality compares payloads: leaf values, kind identity and children.
/// Source positions are diagnostic metadata and do not participate.
impl PartialEq for TreeNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (Payload::Leaf(a), Payload::Leaf(b)) => a == b,
            (
                Payload::Structural {
                    kind: ka,
                    children: ca,
                },
                Payload::Structural {
                    kind: kb,
                    children: cb,
                },
            ) => Arc::as_ptr(ka) as *const () == Arc::as_ptr(kb) as *const () && ca == cb,
            _ => false,
        }
    }
}

impl Debug for TreeNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Leaf(value) => write!(f, "Leaf({:?})", value),
            Payload::Structural { kind, children } => {
                write!(f, "{}{:?}", kind.symbol(), children)
            }
        }
    }
}

impl<'s> From<Value<'s>> for TreeNode<'s> {
    fn from(value: Value<'s>) -> Self {
        TreeNode::leaf(value)
    }
}
