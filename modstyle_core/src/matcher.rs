//! Element selectors for finding style nodes, e.g.
//! `link[module][href], style[module]`.

use std::fmt;
use std::str::FromStr;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::document::Element;

/// A comma separated list of compound selectors. An element matches when
/// any compound matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSelector {
	source: String,
	compounds: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
	/// `None` for `*` or a selector that starts with `[`.
	tag: Option<String>,
	conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
	/// `[name]`
	Exists(String),
	/// `[name=value]`
	Equals(String, String),
	/// `[name~=value]`
	Includes(String, String),
}

impl MatchSelector {
	pub fn parse(selector: &str) -> ModstyleResult<Self> {
		let invalid = |reason: &str| {
			ModstyleError::InvalidSelector {
				selector: selector.to_string(),
				reason: reason.to_string(),
			}
		};

		let mut compounds = Vec::new();
		for part in selector.split(',') {
			let part = part.trim();
			if part.is_empty() {
				return Err(invalid("empty selector in list"));
			}
			compounds.push(parse_compound(part).map_err(&invalid)?);
		}

		Ok(Self {
			source: selector.to_string(),
			compounds,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn matches(&self, element: &Element) -> bool {
		self.compounds.iter().any(|compound| compound.matches(element))
	}
}

impl FromStr for MatchSelector {
	type Err = ModstyleError;

	fn from_str(selector: &str) -> Result<Self, Self::Err> {
		Self::parse(selector)
	}
}

impl fmt::Display for MatchSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

impl Compound {
	fn matches(&self, element: &Element) -> bool {
		if let Some(tag) = &self.tag {
			if !tag.eq_ignore_ascii_case(&element.name) {
				return false;
			}
		}

		self.conditions.iter().all(|condition| {
			match condition {
				Condition::Exists(name) => element.has_attr(name),
				Condition::Equals(name, value) => element.attr(name) == Some(value.as_str()),
				Condition::Includes(name, value) => {
					element
						.attr(name)
						.is_some_and(|attr| attr.split_whitespace().any(|word| word == value))
				}
			}
		})
	}
}

fn parse_compound(part: &str) -> Result<Compound, &'static str> {
	let tag_end = part.find('[').unwrap_or(part.len());
	let tag = part[..tag_end].trim();

	if tag.chars().any(char::is_whitespace) {
		return Err("descendant combinators are not supported");
	}
	if !tag.is_empty() && tag != "*" && !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
		return Err("tag names may only contain letters, digits and `-`");
	}

	let mut conditions = Vec::new();
	let mut rest = &part[tag_end..];

	while !rest.is_empty() {
		let Some(inner) = rest.strip_prefix('[') else {
			return Err("expected `[` to start an attribute condition");
		};
		let Some(close) = inner.find(']') else {
			return Err("unclosed `[`");
		};
		conditions.push(parse_condition(&inner[..close])?);
		rest = &inner[close + 1..];
	}

	Ok(Compound {
		tag: (!tag.is_empty() && tag != "*").then(|| tag.to_string()),
		conditions,
	})
}

fn parse_condition(condition: &str) -> Result<Condition, &'static str> {
	let strip = |value: &str| {
		let value = value.trim();
		value
			.strip_prefix('"')
			.and_then(|v| v.strip_suffix('"'))
			.or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
			.unwrap_or(value)
			.to_string()
	};

	let condition = condition.trim();
	let condition = if let Some((name, value)) = condition.split_once("~=") {
		Condition::Includes(name.trim().to_string(), strip(value))
	} else if let Some((name, value)) = condition.split_once('=') {
		Condition::Equals(name.trim().to_string(), strip(value))
	} else {
		Condition::Exists(condition.to_string())
	};

	let name = match &condition {
		Condition::Exists(name) | Condition::Equals(name, _) | Condition::Includes(name, _) => name,
	};
	if name.is_empty() || name.chars().any(char::is_whitespace) {
		return Err("attribute conditions need a name");
	}

	Ok(condition)
}
