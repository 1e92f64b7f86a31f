//! A loss-less stylesheet tree.
//!
//! Every node keeps the raw whitespace that surrounded it in the source, so
//! printing an untouched tree reproduces the input byte for byte. Passes
//! rewrite selectors, params and values in place, or drop nodes, and the
//! printer re-emits declaration separators the way the source wrote them.

use std::fmt::Write as _;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::css_lexer::CssToken;
use crate::css_lexer::SpannedToken;
use crate::css_lexer::tokenize;
use crate::selector::LocalSelector;

/// A parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
	pub root: Block,
}

/// An ordered list of child nodes together with the whitespace that closes
/// the list and whether the final declaration carried a semicolon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
	pub nodes: Vec<CssNode>,
	/// Raw text between the last child and the closing brace (or end of
	/// input for the root block).
	pub after: String,
	/// Whether the last declaration in the source was terminated by `;`.
	pub semicolon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssNode {
	Rule(Rule),
	AtRule(AtRule),
	Declaration(Declaration),
	Comment(Comment),
}

/// A qualified rule, e.g. `.a:hover { color: red }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
	pub before: String,
	pub selector: String,
	/// Raw text between the selector and `{`.
	pub between: String,
	pub block: Block,
	/// Scoping annotations attached by the local scope pass and consumed by
	/// the scope pass.
	pub(crate) local: Option<LocalSelector>,
	pub(crate) composes: Vec<Composition>,
}

/// An at-rule with or without a body, e.g. `@media screen { ... }` or
/// `@value primary: red;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtRule {
	pub before: String,
	/// The name without the leading `@`.
	pub name: String,
	/// Raw text between the name and the params.
	pub after_name: String,
	pub params: String,
	/// Raw text between the params and `{` or `;`.
	pub between: String,
	pub block: Option<Block>,
	/// Set by the local scope pass for locally scoped `@keyframes`.
	pub(crate) local_name: Option<String>,
}

/// A declaration, e.g. `color: red`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
	pub before: String,
	pub prop: String,
	/// Raw text between the property and the value, colon included.
	pub between: String,
	pub value: String,
	/// Raw text between the value and the terminating `;`.
	pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
	pub before: String,
	/// The full comment including the `/*` and `*/` delimiters.
	pub text: String,
}

/// One entry from a `composes` declaration after import resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Composition {
	/// A class defined in the same stylesheet.
	Local(String),
	/// A class name used verbatim (`from global`).
	Global(String),
	/// The scoped names of a class imported from another file.
	Imported(Vec<String>),
}

impl CssNode {
	pub fn before(&self) -> &str {
		match self {
			Self::Rule(rule) => &rule.before,
			Self::AtRule(at_rule) => &at_rule.before,
			Self::Declaration(decl) => &decl.before,
			Self::Comment(comment) => &comment.before,
		}
	}

	fn takes_semicolon(&self) -> bool {
		match self {
			Self::Declaration(_) => true,
			Self::AtRule(at_rule) => at_rule.block.is_none(),
			Self::Rule(_) | Self::Comment(_) => false,
		}
	}
}

impl Declaration {
	/// The property name, lowercased, for matching purposes.
	pub fn property(&self) -> String {
		self.prop.trim().to_ascii_lowercase()
	}
}

impl Block {
	/// Visit every node of this block and its descendants, depth first.
	pub fn walk_mut(&mut self, visitor: &mut impl FnMut(&mut CssNode)) {
		for node in &mut self.nodes {
			visitor(node);
			match node {
				CssNode::Rule(rule) => rule.block.walk_mut(visitor),
				CssNode::AtRule(AtRule {
					block: Some(block), ..
				}) => block.walk_mut(visitor),
				_ => {}
			}
		}
	}

	/// Visit every node of this block and its descendants, depth first.
	pub fn walk(&self, visitor: &mut impl FnMut(&CssNode)) {
		for node in &self.nodes {
			visitor(node);
			match node {
				CssNode::Rule(rule) => rule.block.walk(visitor),
				CssNode::AtRule(AtRule {
					block: Some(block), ..
				}) => block.walk(visitor),
				_ => {}
			}
		}
	}

	/// Recursively drop every node for which `keep` returns `false`.
	pub fn retain(&mut self, keep: &mut impl FnMut(&CssNode) -> bool) {
		self.nodes.retain(|node| keep(node));
		for node in &mut self.nodes {
			match node {
				CssNode::Rule(rule) => rule.block.retain(keep),
				CssNode::AtRule(AtRule {
					block: Some(block), ..
				}) => block.retain(keep),
				_ => {}
			}
		}
	}

	fn write_to(&self, out: &mut String) {
		let last = self
			.nodes
			.iter()
			.rposition(|node| !matches!(node, CssNode::Comment(_)));

		for (index, node) in self.nodes.iter().enumerate() {
			out.push_str(node.before());
			node.write_to(out);
			if node.takes_semicolon() && (Some(index) != last || self.semicolon) {
				out.push(';');
			}
		}

		out.push_str(&self.after);
	}
}

impl CssNode {
	fn write_to(&self, out: &mut String) {
		match self {
			Self::Rule(rule) => {
				let _ = write!(out, "{}{}{{", rule.selector, rule.between);
				rule.block.write_to(out);
				out.push('}');
			}
			Self::AtRule(at_rule) => {
				let _ = write!(
					out,
					"@{}{}{}{}",
					at_rule.name, at_rule.after_name, at_rule.params, at_rule.between
				);
				if let Some(block) = &at_rule.block {
					out.push('{');
					block.write_to(out);
					out.push('}');
				}
			}
			Self::Declaration(decl) => {
				let _ = write!(
					out,
					"{}{}{}{}",
					decl.prop, decl.between, decl.value, decl.after
				);
			}
			Self::Comment(comment) => out.push_str(&comment.text),
		}
	}
}

impl Stylesheet {
	/// Parse stylesheet text. `origin` only labels errors.
	pub fn parse(source: &str, origin: &str) -> ModstyleResult<Self> {
		let tokens = tokenize(source).map_err(|offset| {
			ModstyleError::CssSyntax {
				origin: origin.to_string(),
				message: format!("unterminated string or comment at byte {offset}"),
			}
		})?;

		let mut parser = StatementParser {
			source,
			tokens,
			cursor: 0,
			origin,
		};
		let root = parser.parse_block(false)?;

		Ok(Self { root })
	}

	/// Print the tree back to stylesheet text.
	pub fn to_css(&self) -> String {
		let mut out = String::new();
		self.root.write_to(&mut out);
		out
	}
}

/// How a statement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
	BraceOpen,
	Semicolon,
	BraceClose,
	End,
}

/// Walks the logos token stream and groups tokens into statements, in the
/// manner of a postcss-style parser: a statement ending in `{` opens a rule
/// or an at-rule body, one ending in `;` or `}` is a declaration or a
/// body-less at-rule.
struct StatementParser<'a> {
	source: &'a str,
	tokens: Vec<SpannedToken>,
	cursor: usize,
	origin: &'a str,
}

impl<'a> StatementParser<'a> {
	fn peek(&self) -> Option<CssToken> {
		self.tokens.get(self.cursor).map(|token| token.kind)
	}

	fn slice(&self, start: usize, end: usize) -> &'a str {
		let from = self.tokens.get(start).map_or(self.source.len(), |t| t.span.start);
		let to = if end == 0 {
			from
		} else {
			self.tokens
				.get(end - 1)
				.map_or(self.source.len(), |t| t.span.end)
		};
		&self.source[from..to.max(from)]
	}

	fn syntax_error(&self, message: impl Into<String>) -> ModstyleError {
		ModstyleError::CssSyntax {
			origin: self.origin.to_string(),
			message: message.into(),
		}
	}

	/// Consume leading whitespace and return it.
	fn take_whitespace(&mut self) -> &'a str {
		let start = self.cursor;
		while matches!(self.peek(), Some(CssToken::Whitespace)) {
			self.cursor += 1;
		}
		self.slice(start, self.cursor)
	}

	fn parse_block(&mut self, nested: bool) -> ModstyleResult<Block> {
		let mut block = Block::default();
		let mut pending = String::new();

		loop {
			pending.push_str(self.take_whitespace());

			match self.peek() {
				None => {
					if nested {
						return Err(self.syntax_error("unclosed block, expected `}`"));
					}
					block.after = pending;
					return Ok(block);
				}
				Some(CssToken::BraceClose) => {
					if !nested {
						return Err(self.syntax_error("unexpected `}`"));
					}
					self.cursor += 1;
					block.after = pending;
					return Ok(block);
				}
				Some(CssToken::Comment) => {
					let text = self.slice(self.cursor, self.cursor + 1).to_string();
					self.cursor += 1;
					block.nodes.push(CssNode::Comment(Comment {
						before: std::mem::take(&mut pending),
						text,
					}));
				}
				Some(CssToken::Semicolon) => {
					// A stray `;` is kept as raw text in front of the next node.
					self.cursor += 1;
					pending.push(';');
				}
				Some(_) => {
					let before = std::mem::take(&mut pending);
					let node = self.parse_statement(before, &mut block.semicolon)?;
					block.nodes.push(node);
				}
			}
		}
	}

	/// Scan forward from the cursor to the statement terminator, skipping
	/// over parenthesised groups. Returns the terminator and the index of the
	/// terminator token (or the token count at end of input).
	fn find_terminator(&self) -> (Terminator, usize) {
		let mut depth = 0usize;
		let mut index = self.cursor;

		while let Some(token) = self.tokens.get(index) {
			match token.kind {
				CssToken::ParenOpen => depth += 1,
				CssToken::ParenClose => depth = depth.saturating_sub(1),
				CssToken::BraceOpen if depth == 0 => return (Terminator::BraceOpen, index),
				CssToken::Semicolon if depth == 0 => return (Terminator::Semicolon, index),
				CssToken::BraceClose => return (Terminator::BraceClose, index),
				_ => {}
			}
			index += 1;
		}

		(Terminator::End, index)
	}

	/// Index one past the last non-whitespace token in `start..end`.
	fn trim_end(&self, start: usize, end: usize) -> usize {
		let mut end = end;
		while end > start && self.tokens[end - 1].kind == CssToken::Whitespace {
			end -= 1;
		}
		end
	}

	fn parse_statement(&mut self, before: String, semicolon: &mut bool) -> ModstyleResult<CssNode> {
		let start = self.cursor;
		let (terminator, end) = self.find_terminator();
		let is_at_rule = self.tokens[start].kind == CssToken::AtKeyword;

		match terminator {
			Terminator::BraceOpen => {
				let content_end = self.trim_end(start, end);
				let between = self.slice(content_end, end).to_string();
				self.cursor = end + 1;

				let node = if is_at_rule {
					let (name, after_name, params) = self.split_at_rule(start, content_end);
					let block = self.parse_block(true)?;
					CssNode::AtRule(AtRule {
						before,
						name,
						after_name,
						params,
						between,
						block: Some(block),
						local_name: None,
					})
				} else {
					let selector = self.slice(start, content_end).to_string();
					let block = self.parse_block(true)?;
					CssNode::Rule(Rule {
						before,
						selector,
						between,
						block,
						local: None,
						composes: Vec::new(),
					})
				};

				*semicolon = false;
				Ok(node)
			}
			Terminator::Semicolon | Terminator::BraceClose | Terminator::End => {
				let content_end = self.trim_end(start, end);
				let trailing = if terminator == Terminator::Semicolon {
					self.cursor = end + 1;
					self.slice(content_end, end).to_string()
				} else {
					// Trailing whitespace before `}` belongs to the block.
					self.cursor = content_end;
					String::new()
				};
				*semicolon = terminator == Terminator::Semicolon;

				if is_at_rule {
					let (name, after_name, params) = self.split_at_rule(start, content_end);
					return Ok(CssNode::AtRule(AtRule {
						before,
						name,
						after_name,
						params,
						between: trailing,
						block: None,
						local_name: None,
					}));
				}

				Ok(CssNode::Declaration(self.split_declaration(
					before,
					start,
					content_end,
					trailing,
				)))
			}
		}
	}

	fn split_at_rule(&self, start: usize, end: usize) -> (String, String, String) {
		let name = self.slice(start, start + 1)[1..].to_string();
		let mut params_start = start + 1;
		while params_start < end && self.tokens[params_start].kind == CssToken::Whitespace {
			params_start += 1;
		}
		let after_name = self.slice(start + 1, params_start).to_string();
		let params = self.slice(params_start, end).to_string();
		(name, after_name, params)
	}

	fn split_declaration(
		&self,
		before: String,
		start: usize,
		end: usize,
		after: String,
	) -> Declaration {
		let colon = (start..end).find(|&index| self.tokens[index].kind == CssToken::Colon);

		let Some(colon) = colon else {
			return Declaration {
				before,
				prop: self.slice(start, end).to_string(),
				between: String::new(),
				value: String::new(),
				after,
			};
		};

		let prop_end = self.trim_end(start, colon);
		let mut value_start = colon + 1;
		while value_start < end && self.tokens[value_start].kind.is_trivia() {
			value_start += 1;
		}

		Declaration {
			before,
			prop: self.slice(start, prop_end).to_string(),
			between: self.slice(prop_end, value_start).to_string(),
			value: self.slice(value_start, end).to_string(),
			after,
		}
	}
}

/// Split `text` into identifier-like words and the separators between them,
/// leaving quoted strings and `url(...)` untouched. Used by passes that swap
/// whole identifiers inside values.
pub(crate) fn replace_identifiers(text: &str, replace: &mut impl FnMut(&str) -> Option<String>) -> String {
	let mut out = String::with_capacity(text.len());
	let mut chars = text.char_indices().peekable();

	while let Some(&(index, ch)) = chars.peek() {
		if ch == '"' || ch == '\'' {
			let quote = ch;
			let mut end = text.len();
			chars.next();
			let mut escaped = false;
			for (inner, c) in chars.by_ref() {
				if escaped {
					escaped = false;
				} else if c == '\\' {
					escaped = true;
				} else if c == quote {
					end = inner + c.len_utf8();
					break;
				}
			}
			out.push_str(&text[index..end]);
			continue;
		}

		if is_identifier_char(ch) {
			let mut end = index;
			while let Some(&(inner, c)) = chars.peek() {
				if !is_identifier_char(c) {
					break;
				}
				end = inner + c.len_utf8();
				chars.next();
			}
			let word = &text[index..end];

			if word.eq_ignore_ascii_case("url") && text[end..].starts_with('(') {
				let close = text[end..].find(')').map_or(text.len(), |offset| end + offset + 1);
				out.push_str(&text[index..close]);
				while chars.peek().is_some_and(|&(inner, _)| inner < close) {
					chars.next();
				}
				continue;
			}

			match replace(word) {
				Some(replacement) => out.push_str(&replacement),
				None => out.push_str(word),
			}
			continue;
		}

		out.push(ch);
		chars.next();
	}

	out
}

/// Characters that may appear in a css identifier.
pub(crate) fn is_identifier_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}
