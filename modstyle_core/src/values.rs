//! `@value` constants.
//!
//! ```css
//! @value primary: #0c77f8;
//! @value small: (max-width: 599px);
//! @value accent, danger as error from "./colors.css";
//! ```
//!
//! Definitions may use earlier constants. All `@value` rules are removed and
//! every constant is substituted into declaration values and at-rule params.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::fetch::ImportChain;
use crate::fetch::Session;
use crate::fetch::fetch;
use crate::pipeline::ModuleOutput;
use crate::stylesheet::CssNode;
use crate::stylesheet::Stylesheet;
use crate::stylesheet::is_identifier_char;
use crate::stylesheet::replace_identifiers;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ValueRule {
	Definition {
		name: String,
		value: String,
	},
	Import {
		/// `(imported name, local alias)` pairs.
		names: Vec<(String, String)>,
		source: String,
	},
}

/// Run the constants stage. Returns the constants visible in the stylesheet
/// in declaration order.
pub(crate) async fn run(
	sheet: &mut Stylesheet,
	session: &Session,
	origin: &Path,
	chain: &ImportChain,
) -> ModstyleResult<Vec<(String, String)>> {
	let mut rules = Vec::new();
	sheet.root.walk(&mut |node| {
		if let CssNode::AtRule(at_rule) = node {
			if at_rule.name == "value" {
				if let Some(rule) = parse_value_rule(&at_rule.params) {
					rules.push(rule);
				}
			}
		}
	});

	if rules.is_empty() {
		return Ok(Vec::new());
	}

	let mut values: Vec<(String, String)> = Vec::new();
	let mut imported: HashMap<String, Arc<ModuleOutput>> = HashMap::new();

	for rule in rules {
		match rule {
			ValueRule::Definition { name, value } => {
				let value = substitute(&value, &values);
				trace!(name = %name, value = %value, "defined constant");
				set(&mut values, name, value);
			}
			ValueRule::Import { names, source } => {
				// `from colors` names a constant holding the path.
				let source = lookup(&values, &source).map_or(source.clone(), str::to_string);
				let output = match imported.get(&source) {
					Some(output) => Arc::clone(output),
					None => {
						let output = fetch(session, &source, origin, chain).await?;
						imported.insert(source.clone(), Arc::clone(&output));
						output
					}
				};

				for (name, alias) in names {
					let Some(value) = output.value(&name) else {
						return Err(ModstyleError::UndefinedConstant {
							name,
							path: crate::resolve::unquote(&source).into_owned(),
						});
					};
					set(&mut values, alias, value.to_string());
				}
			}
		}
	}

	sheet.root.retain(&mut |node| {
		!matches!(node, CssNode::AtRule(at_rule) if at_rule.name == "value")
	});

	sheet.root.walk_mut(&mut |node| {
		match node {
			CssNode::Declaration(decl) => decl.value = substitute(&decl.value, &values),
			CssNode::AtRule(at_rule) => at_rule.params = substitute(&at_rule.params, &values),
			CssNode::Rule(_) | CssNode::Comment(_) => {}
		}
	});

	Ok(values)
}

fn lookup<'a>(values: &'a [(String, String)], name: &str) -> Option<&'a str> {
	values
		.iter()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.as_str())
}

fn set(values: &mut Vec<(String, String)>, name: String, value: String) {
	match values.iter_mut().find(|(key, _)| *key == name) {
		Some((_, existing)) => *existing = value,
		None => values.push((name, value)),
	}
}

fn substitute(text: &str, values: &[(String, String)]) -> String {
	if values.is_empty() {
		return text.to_string();
	}
	replace_identifiers(text, &mut |word| lookup(values, word).map(str::to_string))
}

/// Parse the params of an `@value` rule.
fn parse_value_rule(params: &str) -> Option<ValueRule> {
	let params = params.trim();

	if let Some((names, source)) = split_import(params) {
		let names = names
			.split(',')
			.filter_map(|entry| {
				let mut words = entry.split_whitespace();
				match (words.next(), words.next(), words.next(), words.next()) {
					(Some(name), None, None, None) => Some((name.to_string(), name.to_string())),
					(Some(name), Some("as"), Some(alias), None) => {
						Some((name.to_string(), alias.to_string()))
					}
					_ => None,
				}
			})
			.collect::<Vec<_>>();

		if names.is_empty() {
			return None;
		}

		return Some(ValueRule::Import {
			names,
			source: source.to_string(),
		});
	}

	let name_end = params
		.char_indices()
		.find(|(_, ch)| !is_identifier_char(*ch))
		.map_or(params.len(), |(index, _)| index);
	if name_end == 0 {
		return None;
	}

	let name = &params[..name_end];
	let rest = params[name_end..].trim_start();
	let value = rest.strip_prefix(':').unwrap_or(rest).trim();

	Some(ValueRule::Definition {
		name: name.to_string(),
		value: value.to_string(),
	})
}

/// Split `a, b as c from "./file.css"` into the name list and the source.
fn split_import(params: &str) -> Option<(&str, &str)> {
	let index = params.rfind(" from ")?;
	let names = params[..index].trim();
	let source = params[index + " from ".len()..].trim();

	// A definition whose value happens to contain ` from ` has a colon
	// before it.
	if names.is_empty() || source.is_empty() || names.contains(':') {
		return None;
	}

	Some((names, source))
}
