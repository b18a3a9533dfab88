use std::sync::Arc;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::error::{Error, ErrorKind};
use crate::handle::HostHandle;
use crate::kind::{
    CompileContext, KindClass, KindRef, NodeKind, Optimization, RenderContext, literal_of,
    render_argument, render_child,
};
use crate::node::TreeNode;
use crate::value::Value;

/// Parenthesized group: transparent wrapper around a single expression.
pub struct GroupKind;

impl NodeKind for GroupKind {
    fn class(&self) -> KindClass {
        KindClass::Group
    }

    fn symbol(&self) -> &str {
        "("
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        render_child(ctx, node, store, 0)
    }

    fn compile(&self, ctx: &mut dyn CompileContext, node: &TreeNode<'_>) -> Result<(), Error> {
        let child = node.child(0).ok_or_else(|| {
            Error::at(
                node.line,
                node.column,
                ErrorKind::MissingOperand {
                    symbol: self.symbol().into(),
                    index: 0,
                },
            )
        })?;
        ctx.compile_node(child)
    }
}

/// Boundary node holding a parent's operand list one level down. Argument
/// accessors unwrap it transparently; rendered directly it yields the array
/// of its rendered operands.
pub struct ArgumentsKind;

impl NodeKind for ArgumentsKind {
    fn class(&self) -> KindClass {
        KindClass::Arguments
    }

    fn symbol(&self) -> &str {
        ","
    }

    // The wrapper is a structural boundary; folding belongs to the parent.
    fn optimization(&self) -> Optimization {
        Optimization::None
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        render_children_to_array(self.symbol(), ctx, node, store)
    }
}

/// Array literal: renders to an owned `Value::Array` of its operands.
pub struct ArrayLiteralKind;

impl NodeKind for ArrayLiteralKind {
    fn class(&self) -> KindClass {
        KindClass::ArrayLiteral
    }

    fn symbol(&self) -> &str {
        "["
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        render_children_to_array(self.symbol(), ctx, node, store)
    }
}

fn render_children_to_array<'s>(
    symbol: &str,
    ctx: &mut dyn RenderContext,
    node: &TreeNode<'s>,
    store: HostHandle,
) -> Result<TreeNode<'s>, Error> {
    let mut items: SmallVec<[Value<'s>; 4]> = SmallVec::with_capacity(node.child_count());
    for idx in 0..node.child_count() {
        let rendered = render_child(ctx, node, store, idx)?;
        items.push(literal_of(symbol, &rendered)?.clone());
    }
    Ok(TreeNode::leaf(Value::Array(items.into_vec())).at(node.line, node.column))
}

/// Output statement: renders its single operand and appends the coerced text
/// to the renderer's output.
pub struct OutputKind;

impl NodeKind for OutputKind {
    fn class(&self) -> KindClass {
        KindClass::Output
    }

    fn symbol(&self) -> &str {
        "{{"
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    // Rendering writes to the output sink; never fold.
    fn optimization(&self) -> Optimization {
        Optimization::None
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        let rendered = render_argument(ctx, node, store, 0)?;
        let value = literal_of(self.symbol(), &rendered)?;
        ctx.write(&value.to_text())?;
        Ok(TreeNode::leaf(Value::Nil).at(node.line, node.column))
    }
}

/// Variable dereference: resolves its operand's text as a name against the
/// data-store root. Qualified lookup stays with the host's resolver.
pub struct VariableKind;

impl NodeKind for VariableKind {
    fn class(&self) -> KindClass {
        KindClass::Variable
    }

    fn symbol(&self) -> &str {
        "var"
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    // Resolution depends on the store at render time.
    fn optimization(&self) -> Optimization {
        Optimization::None
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        let rendered = render_argument(ctx, node, store, 0)?;
        let name = literal_of(self.symbol(), &rendered)?.to_text();
        let value = ctx.resolve(&name, store)?;
        Ok(TreeNode::leaf(value).at(node.line, node.column))
    }
}

pub type BinaryOp = fn(&Value<'_>, &Value<'_>) -> Result<Value<'static>, ErrorKind>;

enum OpImpl {
    Binary(BinaryOp),
    Arithmetic {
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    },
}

/// Binary operator over two eagerly rendered operands.
///
/// [`OperatorKind::arithmetic`] applies the dialect's numeric promotion: two
/// ints stay integral, any float operand promotes both sides to float, and
/// anything non-numeric is a type diagnostic. [`OperatorKind::new`] accepts
/// an arbitrary coercion rule for comparison- and concatenation-style
/// operators.
pub struct OperatorKind {
    symbol: SmolStr,
    op: OpImpl,
}

impl OperatorKind {
    pub fn new(symbol: impl Into<SmolStr>, op: BinaryOp) -> KindRef {
        Arc::new(OperatorKind {
            symbol: symbol.into(),
            op: OpImpl::Binary(op),
        })
    }

    /// Integral ops report failure (overflow, division by zero) as `None`,
    /// which surfaces as an arithmetic diagnostic.
    pub fn arithmetic(
        symbol: impl Into<SmolStr>,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> KindRef {
        Arc::new(OperatorKind {
            symbol: symbol.into(),
            op: OpImpl::Arithmetic { int_op, float_op },
        })
    }

    fn apply(&self, lhs: &Value<'_>, rhs: &Value<'_>) -> Result<Value<'static>, ErrorKind> {
        match &self.op {
            OpImpl::Binary(op) => op(lhs, rhs),
            OpImpl::Arithmetic { int_op, float_op } => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    int_op(*a, *b)
                        .map(Value::Int)
                        .ok_or_else(|| ErrorKind::Arithmetic {
                            symbol: self.symbol.clone(),
                        })
                }
                (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                    Ok(Value::Float(float_op(lhs.to_float(), rhs.to_float())))
                }
                _ => Err(ErrorKind::InvalidOperands {
                    symbol: self.symbol.clone(),
                    lhs: lhs.type_name(),
                    rhs: rhs.type_name(),
                }),
            },
        }
    }
}

impl NodeKind for OperatorKind {
    fn class(&self) -> KindClass {
        KindClass::Operator
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn max_children(&self) -> Option<usize> {
        Some(2)
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        let lhs = render_argument(ctx, node, store, 0)?;
        let rhs = render_argument(ctx, node, store, 1)?;
        let lhs = literal_of(&self.symbol, &lhs)?;
        let rhs = literal_of(&self.symbol, &rhs)?;
        let value = self
            .apply(lhs, rhs)
            .map_err(|kind| Error::at(node.line, node.column, kind))?;
        Ok(TreeNode::leaf(value).at(node.line, node.column))
    }
}
