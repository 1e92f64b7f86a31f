//! Local-by-default marking.
//!
//! Every rule gets a [`LocalSelector`] describing which of its class and id
//! names are locally scoped, and every `@keyframes` rule whose name is not
//! wrapped in `:global(...)` is marked local. Rules inside a keyframes body
//! are keyframe selectors (`from`, `50%`) and are left alone.

use tracing::trace;

use crate::ModstyleResult;
use crate::selector::LocalSelector;
use crate::selector::keyframes_name;
use crate::stylesheet::Block;
use crate::stylesheet::CssNode;
use crate::stylesheet::Stylesheet;

pub(crate) fn run(sheet: &mut Stylesheet) -> ModstyleResult<()> {
	mark_block(&mut sheet.root)
}

/// Whether an at-rule name introduces a keyframes block, including vendor
/// prefixed forms such as `-webkit-keyframes`.
pub(crate) fn is_keyframes(name: &str) -> bool {
	name.eq_ignore_ascii_case("keyframes")
		|| (name.starts_with('-') && name.to_ascii_lowercase().ends_with("-keyframes"))
}

fn mark_block(block: &mut Block) -> ModstyleResult<()> {
	for node in &mut block.nodes {
		match node {
			CssNode::Rule(rule) => {
				rule.local = Some(LocalSelector::parse(&rule.selector)?);
				mark_block(&mut rule.block)?;
			}
			CssNode::AtRule(at_rule) if is_keyframes(&at_rule.name) => {
				let (name, local) = keyframes_name(&at_rule.params);
				trace!(name = %name, local, "keyframes");
				if local {
					at_rule.local_name = Some(name.clone());
				}
				at_rule.params = name;
			}
			CssNode::AtRule(at_rule) => {
				if let Some(block) = &mut at_rule.block {
					mark_block(block)?;
				}
			}
			CssNode::Declaration(_) | CssNode::Comment(_) => {}
		}
	}

	Ok(())
}
