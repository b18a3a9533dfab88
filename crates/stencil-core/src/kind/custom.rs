use std::any::Any;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::{Error, ErrorKind};
use crate::handle::HostHandle;
use crate::kind::{CompileContext, KindClass, KindRef, NodeKind, Optimization, RenderContext};
use crate::node::TreeNode;

/// Host-supplied render operation for a [`CustomKind`]. Receives the kind's
/// opaque user data as its last argument.
pub type UserRenderFn = for<'s> fn(
    &mut dyn RenderContext,
    &TreeNode<'s>,
    HostHandle,
    &(dyn Any + Send + Sync),
) -> Result<TreeNode<'s>, Error>;

/// Host-supplied compile operation for a [`CustomKind`].
pub type UserCompileFn =
    fn(&mut dyn CompileContext, &TreeNode<'_>, &(dyn Any + Send + Sync)) -> Result<(), Error>;

/// A kind registered by the embedding host.
///
/// Custom tags, filters and operators are added by constructing one of these
/// and registering it — no core-level subtype is required. The kind carries
/// the two extension slots: an opaque user-data payload handed back to the
/// callbacks, and the render/compile operations themselves.
pub struct CustomKind {
    class: KindClass,
    symbol: SmolStr,
    max_children: Option<usize>,
    optimization: Optimization,
    user_data: Box<dyn Any + Send + Sync>,
    render_fn: UserRenderFn,
    compile_fn: Option<UserCompileFn>,
}

impl CustomKind {
    pub fn new(class: KindClass, symbol: impl Into<SmolStr>, render_fn: UserRenderFn) -> Self {
        CustomKind {
            class,
            symbol: symbol.into(),
            max_children: None,
            optimization: Optimization::None,
            user_data: Box::new(()),
            render_fn,
            compile_fn: None,
        }
    }

    pub fn with_user_data(mut self, data: impl Any + Send + Sync) -> Self {
        self.user_data = Box::new(data);
        self
    }

    pub fn with_compile(mut self, compile_fn: UserCompileFn) -> Self {
        self.compile_fn = Some(compile_fn);
        self
    }

    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = Some(max);
        self
    }

    pub fn with_optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn into_ref(self) -> KindRef {
        Arc::new(self)
    }
}

impl NodeKind for CustomKind {
    fn class(&self) -> KindClass {
        self.class
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn max_children(&self) -> Option<usize> {
        self.max_children
    }

    fn optimization(&self) -> Optimization {
        self.optimization
    }

    fn render<'s>(
        &self,
        ctx: &mut dyn RenderContext,
        node: &TreeNode<'s>,
        store: HostHandle,
    ) -> Result<TreeNode<'s>, Error> {
        (self.render_fn)(ctx, node, store, self.user_data.as_ref())
    }

    fn compile(&self, ctx: &mut dyn CompileContext, node: &TreeNode<'_>) -> Result<(), Error> {
        match self.compile_fn {
            Some(compile_fn) => compile_fn(ctx, node, self.user_data.as_ref()),
            None => Err(Error::at(
                node.line,
                node.column,
                ErrorKind::CompileUnsupported {
                    symbol: self.symbol.clone(),
                },
            )),
        }
    }
}
