//! Scoped name generation and export building.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use tracing::trace;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::fetch::Session;
use crate::imports::is_composes;
use crate::pipeline::TokenMap;
use crate::selector::serialize_identifier;
use crate::stylesheet::Composition;
use crate::stylesheet::CssNode;
use crate::stylesheet::Stylesheet;
use crate::stylesheet::replace_identifiers;

/// Rewrite every local name in `sheet` to its scoped form and return the
/// exported tokens.
pub(crate) fn run(sheet: &mut Stylesheet, session: &Session, origin: &Path) -> ModstyleResult<TokenMap> {
	let mut order: Vec<String> = Vec::new();
	let mut keyframes: HashSet<String> = HashSet::new();
	let mut compositions: HashMap<String, Vec<Composition>> = HashMap::new();

	sheet.root.walk(&mut |node| {
		match node {
			CssNode::Rule(rule) => {
				let Some(local) = &rule.local else {
					return;
				};
				for (_, name) in local.locals() {
					if !order.iter().any(|known| known == name) {
						order.push(name.to_string());
					}
				}
				if !rule.composes.is_empty() {
					for class in local.single_classes().unwrap_or_default() {
						compositions
							.entry(class.to_string())
							.or_default()
							.extend(rule.composes.iter().cloned());
					}
				}
			}
			CssNode::AtRule(at_rule) => {
				if let Some(name) = &at_rule.local_name {
					keyframes.insert(name.clone());
					if !order.iter().any(|known| known == name) {
						order.push(name.clone());
					}
				}
			}
			CssNode::Declaration(_) | CssNode::Comment(_) => {}
		}
	});

	let mut scoped: HashMap<String, String> = HashMap::with_capacity(order.len());
	for name in &order {
		let generated = session.scoped_name(name, origin)?;
		trace!(local = %name, scoped = %generated, "generated scoped name");
		scoped.insert(name.clone(), generated);
	}

	let mut tokens = TokenMap::new();
	for name in &order {
		let mut values = vec![scoped[name].clone()];
		let mut visiting = vec![name.as_str()];
		expand(name, &compositions, &scoped, &mut visiting, &mut values)?;
		tokens.insert(name.clone(), values);
	}

	rewrite(sheet, &scoped, &keyframes);

	Ok(tokens)
}

/// Append everything `name` composes to `values`, depth first, keeping only
/// the first occurrence of each name.
fn expand<'a>(
	name: &str,
	compositions: &'a HashMap<String, Vec<Composition>>,
	scoped: &HashMap<String, String>,
	visiting: &mut Vec<&'a str>,
	values: &mut Vec<String>,
) -> ModstyleResult<()> {
	let Some(entries) = compositions.get(name) else {
		return Ok(());
	};

	for entry in entries {
		match entry {
			Composition::Local(local) => {
				let Some(scoped_local) = scoped.get(local) else {
					return Err(ModstyleError::UnknownComposition {
						name: local.clone(),
						origin: name.to_string(),
					});
				};
				if visiting.contains(&local.as_str()) {
					return Err(ModstyleError::CircularLocalComposition {
						name: local.clone(),
					});
				}
				push_unique(values, scoped_local);
				visiting.push(local);
				expand(local, compositions, scoped, visiting, values)?;
				visiting.pop();
			}
			Composition::Global(global) => push_unique(values, global),
			Composition::Imported(imported) => {
				for value in imported {
					push_unique(values, value);
				}
			}
		}
	}

	Ok(())
}

fn rewrite(sheet: &mut Stylesheet, scoped: &HashMap<String, String>, keyframes: &HashSet<String>) {
	let lookup = |name: &str| scoped.get(name).cloned().unwrap_or_else(|| name.to_string());

	sheet.root.walk_mut(&mut |node| {
		match node {
			CssNode::Rule(rule) => {
				if let Some(local) = rule.local.take() {
					rule.selector = local.render(|_, name| lookup(name));
				}
				if !rule.composes.is_empty() || has_composes(&rule.block.nodes) {
					rule.composes.clear();
					rule.block.nodes.retain(|child| {
						!matches!(child, CssNode::Declaration(decl) if is_composes(decl))
					});
				}
			}
			CssNode::AtRule(at_rule) => {
				if let Some(name) = at_rule.local_name.take() {
					at_rule.params = serialize_identifier(&lookup(&name));
				}
			}
			CssNode::Declaration(decl) => {
				if keyframes.is_empty() || !is_animation(&decl.property()) {
					return;
				}
				decl.value = replace_identifiers(&decl.value, &mut |word| {
					keyframes.contains(word).then(|| serialize_identifier(&lookup(word)))
				});
			}
			CssNode::Comment(_) => {}
		}
	});
}

fn has_composes(nodes: &[CssNode]) -> bool {
	nodes
		.iter()
		.any(|node| matches!(node, CssNode::Declaration(decl) if is_composes(decl)))
}

fn is_animation(property: &str) -> bool {
	let property = property
		.strip_prefix("-webkit-")
		.or_else(|| property.strip_prefix("-moz-"))
		.or_else(|| property.strip_prefix("-o-"))
		.unwrap_or(property);
	matches!(property, "animation" | "animation-name")
}

fn push_unique(values: &mut Vec<String>, value: &str) {
	if !values.iter().any(|existing| existing == value) {
		values.push(value.to_string());
	}
}
