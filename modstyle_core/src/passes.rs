//! Extension passes run after the built-in stages.

use std::fmt;
use std::sync::Arc;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::pipeline::TokenMap;
use crate::stylesheet::CssNode;
use crate::stylesheet::Stylesheet;

/// A stylesheet transformation appended to the pipeline. Passes run in
/// registration order, after scoped names are final, and see the exported
/// tokens of the stylesheet they transform.
pub trait Pass: Send + Sync {
	/// A short identifier used in logs and in the `plugins` config list.
	fn name(&self) -> &str;

	fn run(&self, sheet: &mut Stylesheet, tokens: &TokenMap) -> ModstyleResult<()>;
}

impl fmt::Debug for dyn Pass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Pass({})", self.name())
	}
}

/// Removes every comment from the stylesheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripComments;

impl Pass for StripComments {
	fn name(&self) -> &str {
		"strip-comments"
	}

	fn run(&self, sheet: &mut Stylesheet, _tokens: &TokenMap) -> ModstyleResult<()> {
		sheet
			.root
			.retain(&mut |node| !matches!(node, CssNode::Comment(_)));
		Ok(())
	}
}

/// Look up a built-in pass by name.
pub fn builtin_pass(name: &str) -> ModstyleResult<Arc<dyn Pass>> {
	match name {
		"strip-comments" => Ok(Arc::new(StripComments)),
		other => Err(ModstyleError::UnknownPlugin(other.to_string())),
	}
}
