//! `modstyle_core` is the core library for [modstyle](https://github.com/ifiokjr/modstyle), a build-time css modules transform for html documents. Stylesheets attached to a document with `<style module>` or `<link module href="...">` are scoped: their class names, ids and keyframes are replaced with generated names, and markup that refers to those names through a `classname` attribute gets the generated names in its `class` attribute.
//!
//! ## Processing Pipeline
//!
//! ```text
//! html document
//!   → Document parser (quick-xml events into an owned element tree)
//!   → Rewriter (finds style nodes, one task per node)
//!       → Resolver (inline text or the linked file)
//!       → Pipeline (values → local scope → imports → scope → passes)
//!           → Fetcher (re-enters the pipeline for `composes ... from "file"`)
//!   → Rewriter (class substitution, style nodes become plain <style>)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `modstyle.toml` loading and the [`TransformOptions`] a run is configured with.
//! - [`naming`]: scoped name generation, either the built-in form, a naming template or a custom function.
//! - [`project`]: document discovery for whole-project builds.
//! - [`document`]: the element tree the rewriter works on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modstyle_core::TransformOptions;
//! use modstyle_core::naming::NamingStrategy;
//! use modstyle_core::transform_str;
//!
//! # async fn run() -> modstyle_core::ModstyleResult<()> {
//! let options = TransformOptions::new(".")
//! 	.with_naming(NamingStrategy::template("[local]-test")?);
//! let html = transform_str(
//! 	r#"<style module>.a {color: black}</style><div classname="a"></div>"#,
//! 	&options,
//! )
//! .await?;
//!
//! assert_eq!(html, r#"<style>.a-test {color: black}</style><div class="a-test"></div>"#);
//! # Ok(())
//! # }
//! ```

pub use config::*;
pub use document::Document;
pub use error::*;
pub use fetch::Session;
pub use matcher::MatchSelector;
pub use naming::NamingStrategy;
pub use passes::*;
pub use pipeline::ModuleOutput;
pub use pipeline::TokenMap;
pub use pipeline::process_stylesheet;
pub use rewriter::*;
pub use stylesheet::AtRule;
pub use stylesheet::Block;
pub use stylesheet::Comment;
pub use stylesheet::CssNode;
pub use stylesheet::Declaration;
pub use stylesheet::Rule;
pub use stylesheet::Stylesheet;

pub mod config;
pub(crate) mod css_lexer;
pub mod document;
#[allow(unused_assignments)]
mod error;
mod fetch;
mod imports;
mod local_scope;
mod matcher;
pub mod naming;
mod passes;
mod pipeline;
pub mod project;
pub mod resolve;
mod rewriter;
mod scope;
pub mod selector;
mod stylesheet;
mod values;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
