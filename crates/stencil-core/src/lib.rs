//! Core value model and instruction tree for the `stencil` template engine.
//!
//! This crate holds the pieces every embedding shares: [`Value`], the dynamic
//! value that flows through rendering; [`TreeNode`], the positioned tree a
//! parser produces and a driver walks; and [`NodeKind`], the per-construct
//! descriptor that knows how to render, lower, validate, and optimize the
//! nodes tagged with it. Parsing, the render loop, and lowering backends live
//! in the embedding, wired in through the [`RenderContext`] and
//! [`CompileContext`] traits.
//!
//! ```rust
//! use stencil_core::{Falsiness, TreeNode, Value};
//!
//! let node = TreeNode::leaf(Value::from(0_i64)).at(1, 4);
//! let value = node.literal_value();
//!
//! assert_eq!(value.to_text(), "0");
//! assert!(value.is_truthy(Falsiness::NONE));
//! assert!(!value.is_truthy(Falsiness::ZERO));
//! ```
//!
//! Construct behavior is looked up by symbol through a [`KindRegistry`];
//! hosts extend the language by registering [`CustomKind`] descriptors:
//!
//! ```rust
//! use stencil_core::{builtin::OperatorKind, KindRegistry, Value};
//!
//! let mut registry = KindRegistry::with_builtins();
//! registry.register(OperatorKind::new("~", |lhs, rhs| {
//!     Ok(Value::String(format!("{}{}", lhs.to_text(), rhs.to_text())))
//! }));
//!
//! assert!(registry.get("~").is_some());
//! assert!(registry.get("{{").is_some());
//! ```

mod error;
mod handle;
mod kind;
mod node;
mod value;

pub use error::{Error, ErrorKind};
pub use handle::{HostHandle, NativePtr};
pub use kind::builtin;
pub use kind::custom::{CustomKind, UserCompileFn, UserRenderFn};
pub use kind::{
    CompileContext, KindClass, KindRef, KindRegistry, NodeKind, Optimization, RenderContext,
    literal_of, render_argument, render_child, render_node, validate_tree,
};
pub use node::TreeNode;
pub use value::{Falsiness, Value};
