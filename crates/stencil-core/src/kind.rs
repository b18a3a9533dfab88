pub mod builtin;
pub mod custom;

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;
#[cfg(feature = "ast-json")]
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{Error, ErrorKind};
use crate::handle::HostHandle;
use crate::node::TreeNode;
use crate::value::{Falsiness, Value};

/// Shared reference to a kind descriptor. Kinds are immutable, constructed
/// once (at startup or at custom-kind registration time) and shared by every
/// structural node of that kind; trees own nodes, never kinds.
pub type KindRef = Arc<dyn NodeKind>;

/// Classification of a syntactic construct.
#[cfg_attr(feature = "ast-json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    Variable,
    Tag,
    Group,
    GroupDereference,
    ArrayLiteral,
    Output,
    Arguments,
    Qualifier,
    Operator,
    Filter,
    DotFilter,
    Contextual,
}

/// Constant-folding eligibility of a kind.
#[cfg_attr(feature = "ast-json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Optimization {
    /// Never folded.
    None,
    /// May rewrite its subtree but never collapses to a literal itself.
    Partial,
    /// Collapses to a literal once every operand is one.
    #[default]
    Full,
}

/// Per-call mutable render state, owned by the external renderer.
///
/// Output buffer, variable scopes and loop counters live here, never in the
/// tree. The core calls back into the context for the configured falsiness
/// policy, for name resolution against the data-store root, and to append
/// output.
pub trait RenderContext {
    /// Falsiness policy the dialect was configured with.
    fn falsiness(&self) -> Falsiness {
        Falsiness::NONE
    }

    /// Resolves a name against the data-store root. The resolution mechanism
    /// belongs to the embedding application.
    fn resolve(&mut self, name: &str, store: HostHandle) -> Result<Value<'static>, Error>;

    /// Appends rendered output.
    fn write(&mut self, text: &str) -> Result<(), Error>;

    /// Driver-specific state, for host-registered kinds to downcast.
    fn as_any(&mut self) -> &mut dyn Any;
}

/// Lowering target supplied by the external compiler. The executable format
/// is entirely the backend's; the core only dispatches into it.
pub trait CompileContext {
    /// Lowers a node: the backend handles leaves itself and dispatches
    /// structural nodes back through [`NodeKind::compile`].
    fn compile_node(&mut self, node: &TreeNode<'_>) -> Result<(), Error>;

    /// Backend-specific state, for host-registered kinds to downcast.
    fn as_any(&mut self) -> &mut dyn Any;
}

/// Behavior table for one syntactic construct.
///
/// Every structural node carries a [`KindRef`] to the descriptor of its kind;
/// the render, compile, validate and optimize operations dispatch through it.
/// Each kind decides which children to evaluate and in what order — the core
/// never evaluates children eagerly before dispatch, which is where
/// short-circuiting and lazy argument evaluation live.
pub trait NodeKind: Send + Sync {
    fn class(&self) -> KindClass;

    /// Display symbol, used in diagnostics.
    fn symbol(&self) -> &str;

    /// Maximum number of children; `None` means unbounded.
    fn max_children(&self) -> Option<usize> {
        None
    }

    fn optimization(&self) -> Optimization {
        Optimization::Full
    }

    /// Interprets this node now against the given data-store root, returning
    /// a result node (typically a literal leaf). Type and arity mismatches
    /// surface as diagnostics.
    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error>;

    /// Lowers this node into the backend's executable form. The default
    /// raises a lowering diagnostic; backends and custom kinds override it.
    fn compile(&self, ctx: &mut dyn CompileContext, node: &TreeNode<'_>) -> Result<(), Error> {
        let _ = ctx;
        Err(Error::at(
            node.line,
            node.column,
            ErrorKind::CompileUnsupported {
                symbol: self.symbol().into(),
            },
        ))
    }

    /// Parse-time shape check, called per structural node at tree-assembly
    /// time. The default accepts anything within the child limit.
    fn validate(&self, node: &TreeNode<'_>) -> Result<(), Error> {
        if let Some(max) = self.max_children() {
            let found = node.child_count();
            if found > max {
                return Err(Error::at(
                    node.line,
                    node.column,
                    ErrorKind::TooManyChildren {
                        symbol: self.symbol().into(),
                        max,
                        found,
                    },
                ));
            }
        }
        Ok(())
    }

    /// Attempts to reduce this node to a simpler form, returning whether a
    /// reduction occurred so the driving optimizer can propagate the change
    /// upward.
    ///
    /// The default folds a fully-eligible node whose operands are all
    /// literals by rendering it against the given store.
    fn optimize<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &mut TreeNode<'s>,
        store: HostHandle,
    ) -> Result<bool, Error> {
        if self.optimization() != Optimization::Full {
            return Ok(false);
        }
        let all_literal = (0..node.argument_count())
            .all(|idx| node.argument(idx).is_some_and(TreeNode::is_leaf));
        if !all_literal {
            return Ok(false);
        }
        let folded = self.render(ctx, &*node, store)?;
        if folded.is_leaf() {
            *node = folded;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Renders a node: leaves evaluate to themselves, structural nodes dispatch
/// to their kind.
pub fn render_node<'s>(
    ctx: &mut dyn RenderContext,
    node: &TreeNode<'s>,
    store: HostHandle,
) -> Result<TreeNode<'s>, Error> {
    match node.kind() {
        Some(kind) => kind.render(ctx, node, store),
        None => Ok(node.clone()),
    }
}

/// Renders the `idx`-th child of `node`.
pub fn render_child<'s>(
    ctx: &mut dyn RenderContext,
    node: &TreeNode<'s>,
    store: HostHandle,
    idx: usize,
) -> Result<TreeNode<'s>, Error> {
    let child = node.child(idx).ok_or_else(|| missing_operand(node, idx))?;
    render_node(ctx, child, store)
}

/// Renders the `idx`-th operand of `node`, unwrapping an arguments wrapper.
pub fn render_argument<'s>(
    ctx: &mut dyn RenderContext,
    node: &TreeNode<'s>,
    store: HostHandle,
    idx: usize,
) -> Result<TreeNode<'s>, Error> {
    let argument = node
        .argument(idx)
        .ok_or_else(|| missing_operand(node, idx))?;
    render_node(ctx, argument, store)
}

fn missing_operand(node: &TreeNode<'_>, idx: usize) -> Error {
    let symbol = node
        .kind()
        .map(|kind| SmolStr::from(kind.symbol()))
        .unwrap_or_default();
    Error::at(
        node.line,
        node.column,
        ErrorKind::MissingOperand { symbol, index: idx },
    )
}

/// Extracts the literal value of a rendered operand, raising a type
/// diagnostic when evaluation left a structural node behind.
pub fn literal_of<'a, 's>(symbol: &str, node: &'a TreeNode<'s>) -> Result<&'a Value<'s>, Error> {
    node.value().ok_or_else(|| {
        Error::at(
            node.line,
            node.column,
            ErrorKind::UnexpectedStructural {
                symbol: symbol.into(),
            },
        )
    })
}

/// Validates a whole tree, dispatching [`NodeKind::validate`] on every
/// structural node in pre-order.
pub fn validate_tree(node: &TreeNode<'_>) -> Result<(), Error> {
    if let Some(kind) = node.kind() {
        kind.validate(node)?;
    }
    for child in node.children() {
        validate_tree(child)?;
    }
    Ok(())
}

/// Process-wide table of kind descriptors, keyed by display symbol.
///
/// Built once at startup; custom kinds register here and are afterwards
/// shared read-only by every tree. No other process-wide mutable state
/// exists.
#[derive(Default, Clone)]
pub struct KindRegistry {
    kinds: FxHashMap<SmolStr, KindRef>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the structural reference kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::GroupKind));
        registry.register(Arc::new(builtin::ArgumentsKind));
        registry.register(Arc::new(builtin::ArrayLiteralKind));
        registry.register(Arc::new(builtin::OutputKind));
        registry.register(Arc::new(builtin::VariableKind));
        registry
    }

    /// Registers a kind under its display symbol, replacing any previous
    /// registration, and returns the shared reference.
    pub fn register(&mut self, kind: KindRef) -> KindRef {
        self.kinds
            .insert(SmolStr::from(kind.symbol()), Arc::clone(&kind));
        kind
    }

    pub fn get(&self, symbol: &str) -> Option<&KindRef> {
        self.kinds.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::builtin::{GroupKind, OperatorKind};
    use super::*;

    #[test]
    fn test_registry_builtins() {
        let registry = KindRegistry::with_builtins();
        assert!(!registry.is_empty());
        let group = registry.get("(").expect("group kind registered");
        assert_eq!(group.class(), KindClass::Group);
        assert!(registry.get("no-such-kind").is_none());
    }

    #[test]
    fn test_registry_register_replaces() {
        let mut registry = KindRegistry::new();
        registry.register(Arc::new(GroupKind));
        let plus = registry.register(OperatorKind::arithmetic(
            "+",
            |a, b| a.checked_add(b),
            |a, b| a + b,
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("+").unwrap().symbol(), plus.symbol());
    }

    #[test]
    fn test_default_validate_enforces_max_children() {
        let kind: KindRef = Arc::new(GroupKind);
        let ok = TreeNode::structural(Arc::clone(&kind), vec![TreeNode::leaf(Value::Int(1))]);
        assert!(validate_tree(&ok).is_ok());

        let too_many = TreeNode::structural(
            kind,
            vec![TreeNode::leaf(Value::Int(1)), TreeNode::leaf(Value::Int(2))],
        )
        .at(4, 2);
        let err = validate_tree(&too_many).unwrap_err();
        assert_eq!((err.line, err.column), (4, 2));
        assert!(matches!(err.kind, ErrorKind::TooManyChildren { .. }));
    }
}
