//! `composes` resolution.
//!
//! ```css
//! .button {
//!   composes: base rounded;
//!   composes: primary from "./theme.css";
//!   composes: clearfix from global;
//! }
//! ```
//!
//! Local names are recorded for the scope stage, `from global` names are kept
//! verbatim and names imported from another file are replaced by that file's
//! exported scoped names.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::fetch::ImportChain;
use crate::fetch::Session;
use crate::fetch::fetch;
use crate::pipeline::ModuleOutput;
use crate::resolve::unquote;
use crate::selector::unescape_identifier;
use crate::stylesheet::CssNode;
use crate::stylesheet::Composition;
use crate::stylesheet::Declaration;
use crate::stylesheet::Stylesheet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ComposeSource {
	Local,
	Global,
	File(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComposeEntry {
	names: Vec<String>,
	source: ComposeSource,
}

/// Whether a declaration is a composition.
pub(crate) fn is_composes(decl: &Declaration) -> bool {
	matches!(decl.property().as_str(), "composes" | "compose-with")
}

fn parse_composes(value: &str) -> ComposeEntry {
	let value = value.trim();
	let (names, source) = match value.rfind(" from ") {
		Some(index) => {
			let source = value[index + " from ".len()..].trim();
			let source = if source == "global" {
				ComposeSource::Global
			} else {
				ComposeSource::File(source.to_string())
			};
			(&value[..index], source)
		}
		None => (value, ComposeSource::Local),
	};

	ComposeEntry {
		names: names.split_whitespace().map(unescape_identifier).collect(),
		source,
	}
}

pub(crate) async fn run(
	sheet: &mut Stylesheet,
	session: &Session,
	origin: &Path,
	chain: &ImportChain,
) -> ModstyleResult<()> {
	let mut sources: Vec<String> = Vec::new();
	let mut invalid: Option<String> = None;

	sheet.root.walk(&mut |node| {
		let CssNode::Rule(rule) = node else {
			return;
		};

		for child in &rule.block.nodes {
			let CssNode::Declaration(decl) = child else {
				continue;
			};
			if !is_composes(decl) {
				continue;
			}

			let single = rule.local.as_ref().and_then(|local| local.single_classes());
			if single.is_none() && invalid.is_none() {
				invalid = Some(rule.selector.clone());
			}

			if let ComposeSource::File(source) = parse_composes(&decl.value).source {
				if !sources.contains(&source) {
					sources.push(source);
				}
			}
		}
	});

	if let Some(selector) = invalid {
		return Err(ModstyleError::InvalidComposition { selector });
	}

	let mut imported: HashMap<String, Arc<ModuleOutput>> = HashMap::new();
	for source in sources {
		debug!(source = %source, "resolving composition import");
		let output = fetch(session, &source, origin, chain).await?;
		imported.insert(source, output);
	}

	let mut result = Ok(());
	sheet.root.walk_mut(&mut |node| {
		if result.is_err() {
			return;
		}
		let CssNode::Rule(rule) = node else {
			return;
		};

		for child in &rule.block.nodes {
			let CssNode::Declaration(decl) = child else {
				continue;
			};
			if !is_composes(decl) {
				continue;
			}

			let entry = parse_composes(&decl.value);
			for name in entry.names {
				let composition = match &entry.source {
					ComposeSource::Local => Composition::Local(name),
					ComposeSource::Global => Composition::Global(name),
					ComposeSource::File(source) => {
						let exported = imported
							.get(source)
							.and_then(|output| output.tokens.get(&name));
						let Some(exported) = exported else {
							result = Err(ModstyleError::UnknownImport {
								name,
								path: unquote(source).into_owned(),
							});
							return;
						};
						Composition::Imported(exported.to_vec())
					}
				};
				rule.composes.push(composition);
			}
		}
	});

	result
}
