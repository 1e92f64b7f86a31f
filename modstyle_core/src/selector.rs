//! Local-by-default selector analysis.
//!
//! Selectors are split into runs of verbatim text and locally scoped class
//! or id names. `:global(...)`/`:local(...)` switch the mode for their
//! argument, bare `:global`/`:local` switch it for the rest of the complex
//! selector, and every comma starts over in local mode.

use logos::Logos;

use crate::ModstyleError;
use crate::ModstyleResult;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorToken {
	#[regex(r"\.(-?[_a-zA-Z\u{80}-\u{10FFFF}]|\\.)([_a-zA-Z0-9\u{80}-\u{10FFFF}-]|\\.)*")]
	Class,
	#[regex(r"#([_a-zA-Z0-9\u{80}-\u{10FFFF}-]|\\.)+")]
	Id,
	#[token(":global(")]
	GlobalOpen,
	#[token(":local(")]
	LocalOpen,
	#[token(":global")]
	Global,
	#[token(":local")]
	Local,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token(",")]
	Comma,
	#[regex(r"[ \t\r\n\f]+")]
	Whitespace,
	#[regex(r"\[[^\]]*\]")]
	Attribute,
	#[regex(r#""([^"\\]|\\.)*""#)]
	#[regex(r"'([^'\\]|\\.)*'")]
	String,
}

/// Whether a class or id was written with `.` or `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
	Class,
	Id,
}

impl LocalKind {
	fn prefix(self) -> char {
		match self {
			Self::Class => '.',
			Self::Id => '#',
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorPart {
	Text(String),
	Local { kind: LocalKind, name: String },
}

/// A selector with its locally scoped names marked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSelector {
	pub parts: Vec<SelectorPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	Local,
	Global,
}

/// Frame for an open parenthesis: the mode to restore when it closes and
/// whether the parenthesis belongs to a `:global(`/`:local(` wrapper (whose
/// closing `)` is dropped from the output).
struct Frame {
	restore: Mode,
	wrapper: bool,
}

impl LocalSelector {
	/// Analyse a selector in local-by-default mode.
	pub fn parse(selector: &str) -> ModstyleResult<Self> {
		let mut parts = Vec::new();
		let mut text = String::new();
		let mut mode = Mode::Local;
		let mut stack: Vec<Frame> = Vec::new();
		let mut skip_whitespace = false;

		for (result, span) in SelectorToken::lexer(selector).spanned() {
			let slice = &selector[span];

			let Ok(token) = result else {
				skip_whitespace = false;
				text.push_str(slice);
				continue;
			};

			if skip_whitespace {
				skip_whitespace = false;
				if token == SelectorToken::Whitespace {
					continue;
				}
			}

			match token {
				SelectorToken::Class | SelectorToken::Id if mode == Mode::Local => {
					let kind = if token == SelectorToken::Class {
						LocalKind::Class
					} else {
						LocalKind::Id
					};
					if !text.is_empty() {
						parts.push(SelectorPart::Text(std::mem::take(&mut text)));
					}
					parts.push(SelectorPart::Local {
						kind,
						name: unescape_identifier(&slice[1..]),
					});
				}
				SelectorToken::GlobalOpen | SelectorToken::LocalOpen => {
					stack.push(Frame {
						restore: mode,
						wrapper: true,
					});
					mode = if token == SelectorToken::GlobalOpen {
						Mode::Global
					} else {
						Mode::Local
					};
				}
				SelectorToken::Global => {
					mode = Mode::Global;
					skip_whitespace = true;
				}
				SelectorToken::Local => {
					mode = Mode::Local;
					skip_whitespace = true;
				}
				SelectorToken::ParenOpen => {
					stack.push(Frame {
						restore: mode,
						wrapper: false,
					});
					text.push('(');
				}
				SelectorToken::ParenClose => {
					let Some(frame) = stack.pop() else {
						return Err(ModstyleError::CssSyntax {
							origin: selector.to_string(),
							message: "unbalanced `)` in selector".to_string(),
						});
					};
					mode = frame.restore;
					if !frame.wrapper {
						text.push(')');
					}
				}
				SelectorToken::Comma if stack.is_empty() => {
					mode = Mode::Local;
					text.push(',');
				}
				_ => text.push_str(slice),
			}
		}

		if !stack.is_empty() {
			return Err(ModstyleError::CssSyntax {
				origin: selector.to_string(),
				message: "unclosed `(` in selector".to_string(),
			});
		}

		if !text.is_empty() {
			parts.push(SelectorPart::Text(text));
		}

		Ok(Self { parts })
	}

	/// The locally scoped names in order of appearance.
	pub fn locals(&self) -> impl Iterator<Item = (LocalKind, &str)> {
		self.parts.iter().filter_map(|part| {
			match part {
				SelectorPart::Local { kind, name } => Some((*kind, name.as_str())),
				SelectorPart::Text(_) => None,
			}
		})
	}

	/// When the selector is a comma separated list of single local classes
	/// (`.a` or `.a, .b`), return those class names. Composition is only
	/// meaningful for such selectors.
	pub fn single_classes(&self) -> Option<Vec<&str>> {
		let mut names = Vec::new();
		let mut commas = 0;

		for part in &self.parts {
			match part {
				SelectorPart::Local {
					kind: LocalKind::Class,
					name,
				} => {
					if names.len() > commas {
						return None;
					}
					names.push(name.as_str());
				}
				SelectorPart::Local { .. } => return None,
				SelectorPart::Text(text) => {
					if !text.chars().all(|c| c == ',' || c.is_whitespace()) {
						return None;
					}
					commas += text.matches(',').count();
				}
			}
		}

		(!names.is_empty() && names.len() == commas + 1).then_some(names)
	}

	/// Render the selector, passing each local name through `scoped`. The
	/// returned names are escaped for css.
	pub fn render(&self, scoped: impl Fn(LocalKind, &str) -> String) -> String {
		let mut out = String::new();
		for part in &self.parts {
			match part {
				SelectorPart::Text(text) => out.push_str(text),
				SelectorPart::Local { kind, name } => {
					out.push(kind.prefix());
					out.push_str(&serialize_identifier(&scoped(*kind, name)));
				}
			}
		}
		out
	}
}

/// Resolve css escapes in an identifier: `\\:` becomes `:` and hex escapes
/// such as `\\31 ` become the code point they name.
pub fn unescape_identifier(escaped: &str) -> String {
	let mut out = String::with_capacity(escaped.len());
	let mut chars = escaped.chars().peekable();

	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}

		let mut hex = String::new();
		while hex.len() < 6 {
			match chars.peek() {
				Some(digit) if digit.is_ascii_hexdigit() => {
					hex.push(*digit);
					chars.next();
				}
				_ => break,
			}
		}

		if hex.is_empty() {
			if let Some(next) = chars.next() {
				out.push(next);
			}
			continue;
		}

		// A single whitespace terminates a hex escape.
		if chars.peek().is_some_and(|next| next.is_ascii_whitespace()) {
			chars.next();
		}
		let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
		out.push(char::from_u32(code).filter(|c| *c != '\0').unwrap_or('\u{FFFD}'));
	}

	out
}

/// Escape a name so it can be written after `.` or `#` in a selector.
pub fn serialize_identifier(name: &str) -> String {
	let mut out = String::with_capacity(name.len());

	for (index, c) in name.chars().enumerate() {
		let leading_digit = c.is_ascii_digit()
			&& (index == 0 || (index == 1 && name.starts_with('-')));
		if leading_digit {
			out.push_str(&format!("\\{:x} ", u32::from(c)));
		} else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
			out.push(c);
		} else {
			out.push('\\');
			out.push(c);
		}
	}

	out
}

/// Interpret the params of a `@keyframes` rule. Returns the keyframes name
/// and whether it is locally scoped.
pub fn keyframes_name(params: &str) -> (String, bool) {
	let params = params.trim();

	if let Some(inner) = params
		.strip_prefix(":global(")
		.and_then(|rest| rest.strip_suffix(')'))
	{
		return (inner.trim().to_string(), false);
	}

	if let Some(inner) = params
		.strip_prefix(":local(")
		.and_then(|rest| rest.strip_suffix(')'))
	{
		return (inner.trim().to_string(), true);
	}

	(params.to_string(), true)
}
