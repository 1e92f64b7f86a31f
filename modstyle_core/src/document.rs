//! A minimal markup tree.
//!
//! Only elements are modelled. Text, comments, doctypes and anything else
//! between tags is kept as raw source text so that untouched parts of the
//! document render back exactly as written.

use std::borrow::Cow;
use std::fmt;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use tracing::trace;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::matcher::MatchSelector;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: [&str; 14] = [
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
	pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
	Element(Element),
	/// Raw source text, rendered verbatim.
	Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
	pub name: String,
	pub attributes: Vec<Attribute>,
	pub children: Vec<Node>,
	/// Written as `<name/>`.
	pub self_closing: bool,
	/// Whether an end tag is rendered.
	pub end_tag: bool,
}

/// An attribute. An empty value renders as a bare name (`<link module>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: String,
	/// The value with character references decoded.
	pub value: String,
	/// The value as written in the source. Dropped once the value changes.
	pub raw: Option<String>,
}

/// The position of an element as child indices from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Vec<usize>);

impl Element {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			end_tag: true,
			..Self::default()
		}
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|attribute| attribute.name.eq_ignore_ascii_case(name))
			.map(|attribute| attribute.value.as_str())
	}

	pub fn has_attr(&self, name: &str) -> bool {
		self.attr(name).is_some()
	}

	/// Set an attribute, replacing an existing value in place.
	pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
		let value = value.into();
		match self
			.attributes
			.iter_mut()
			.find(|attribute| attribute.name.eq_ignore_ascii_case(name))
		{
			Some(attribute) => {
				attribute.value = value;
				attribute.raw = None;
			}
			None => {
				self.attributes.push(Attribute {
					name: name.to_string(),
					value,
					raw: None,
				});
			}
		}
	}

	pub fn remove_attr(&mut self, name: &str) -> Option<String> {
		let index = self
			.attributes
			.iter()
			.position(|attribute| attribute.name.eq_ignore_ascii_case(name))?;
		Some(self.attributes.remove(index).value)
	}

	/// The concatenated raw text of the direct text children.
	pub fn text(&self) -> String {
		self.children
			.iter()
			.filter_map(|child| {
				match child {
					Node::Text(text) => Some(text.as_str()),
					Node::Element(_) => None,
				}
			})
			.collect()
	}

	pub fn is_void(&self) -> bool {
		is_void(&self.name)
	}

	fn write_to(&self, out: &mut String) {
		out.push('<');
		out.push_str(&self.name);
		for attribute in &self.attributes {
			out.push(' ');
			out.push_str(&attribute.name);
			if attribute.value.is_empty() {
				continue;
			}
			out.push('=');
			match &attribute.raw {
				Some(raw) => {
					let quote = if raw.contains('"') { '\'' } else { '"' };
					out.push(quote);
					out.push_str(raw);
					out.push(quote);
				}
				None => {
					out.push('"');
					out.push_str(&escape(attribute.value.as_str()));
					out.push('"');
				}
			}
		}
		out.push_str(if self.self_closing { "/>" } else { ">" });

		for child in &self.children {
			child.write_to(out);
		}

		if self.end_tag && !self.self_closing {
			out.push_str("</");
			out.push_str(&self.name);
			out.push('>');
		}
	}
}

impl Node {
	fn write_to(&self, out: &mut String) {
		match self {
			Self::Element(element) => element.write_to(out),
			Self::Text(text) => out.push_str(text),
		}
	}
}

fn is_void(name: &str) -> bool {
	VOID_ELEMENTS
		.iter()
		.any(|void| void.eq_ignore_ascii_case(name))
}

fn is_raw_text(name: &str) -> bool {
	RAW_TEXT_ELEMENTS
		.iter()
		.any(|raw| raw.eq_ignore_ascii_case(name))
}

impl Document {
	/// Parse markup. Unclosed elements are closed at the end of input and
	/// stray end tags are kept as text.
	pub fn parse(source: &str) -> ModstyleResult<Self> {
		let mut builder = TreeBuilder::default();
		let mut offset = 0;

		while offset < source.len() {
			offset = builder.parse_from(source, offset)?;
		}

		Ok(builder.finish())
	}

	pub fn render(&self) -> String {
		let mut out = String::new();
		for node in &self.nodes {
			node.write_to(&mut out);
		}
		out
	}

	/// Every element matching `selector`, in document order.
	pub fn select(&self, selector: &MatchSelector) -> Vec<NodeId> {
		let mut found = Vec::new();
		let mut path = Vec::new();
		select_in(&self.nodes, selector, &mut path, &mut found);
		found
	}

	pub fn element(&self, id: &NodeId) -> Option<&Element> {
		let (first, rest) = id.0.split_first()?;
		let mut element = match self.nodes.get(*first)? {
			Node::Element(element) => element,
			Node::Text(_) => return None,
		};
		for index in rest {
			element = match element.children.get(*index)? {
				Node::Element(child) => child,
				Node::Text(_) => return None,
			};
		}
		Some(element)
	}

	pub fn element_mut(&mut self, id: &NodeId) -> Option<&mut Element> {
		let (first, rest) = id.0.split_first()?;
		let mut element = match self.nodes.get_mut(*first)? {
			Node::Element(element) => element,
			Node::Text(_) => return None,
		};
		for index in rest {
			element = match element.children.get_mut(*index)? {
				Node::Element(child) => child,
				Node::Text(_) => return None,
			};
		}
		Some(element)
	}

	/// Visit every element mutably, in document order.
	pub fn for_each_element_mut(&mut self, visitor: &mut impl FnMut(&mut Element)) {
		visit_mut(&mut self.nodes, visitor);
	}
}

impl fmt::Display for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.render())
	}
}

fn select_in(nodes: &[Node], selector: &MatchSelector, path: &mut Vec<usize>, found: &mut Vec<NodeId>) {
	for (index, node) in nodes.iter().enumerate() {
		let Node::Element(element) = node else {
			continue;
		};
		path.push(index);
		if selector.matches(element) {
			found.push(NodeId(path.clone()));
		}
		select_in(&element.children, selector, path, found);
		path.pop();
	}
}

fn visit_mut(nodes: &mut [Node], visitor: &mut impl FnMut(&mut Element)) {
	for node in nodes {
		if let Node::Element(element) = node {
			visitor(element);
			visit_mut(&mut element.children, visitor);
		}
	}
}

/// Builds the tree from quick-xml events. The reader is only used to find
/// tag boundaries; all text is sliced from the source by position.
#[derive(Default)]
struct TreeBuilder {
	nodes: Vec<Node>,
	open: Vec<Element>,
}

impl TreeBuilder {
	fn push(&mut self, node: Node) {
		let siblings = match self.open.last_mut() {
			Some(parent) => &mut parent.children,
			None => &mut self.nodes,
		};

		if let (Node::Text(text), Some(Node::Text(previous))) = (&node, siblings.last_mut()) {
			previous.push_str(text);
			return;
		}

		siblings.push(node);
	}

	fn close(&mut self, name: &str) -> bool {
		let Some(index) = self
			.open
			.iter()
			.rposition(|element| element.name.eq_ignore_ascii_case(name))
		else {
			return false;
		};

		while self.open.len() > index {
			let Some(mut element) = self.open.pop() else {
				break;
			};
			element.end_tag = self.open.len() == index;
			self.push(Node::Element(element));
		}

		true
	}

	fn finish(mut self) -> Document {
		while let Some(mut element) = self.open.pop() {
			element.end_tag = false;
			self.push(Node::Element(element));
		}
		Document { nodes: self.nodes }
	}

	/// Parse from `offset` until the end of input or until a raw text
	/// element has been consumed. Returns the offset to resume at.
	fn parse_from(&mut self, source: &str, offset: usize) -> ModstyleResult<usize> {
		let rest = &source[offset..];
		let mut reader = Reader::from_str(rest);
		let config = reader.config_mut();
		config.check_end_names = false;
		config.allow_unmatched_ends = true;
		config.trim_text(false);

		let mut last = 0;

		loop {
			let event = reader.read_event().map_err(|error| {
				ModstyleError::Markup(format!(
					"{error} at byte {}",
					offset + position(reader.error_position())
				))
			})?;
			let current = position(reader.buffer_position());

			match event {
				Event::Start(start) | Event::Empty(start) if !is_tag_name(start.name().as_ref()) => {
					// A bare `<` in text, as in `1 < 2`.
					self.push(Node::Text(rest[last..current].to_string()));
				}
				Event::Start(start) => {
					let element = element_from(&start, false)?;
					if element.is_void() {
						self.push(Node::Element(Element {
							end_tag: false,
							..element
						}));
					} else if is_raw_text(&element.name) {
						return Ok(offset + self.raw_text_element(element, rest, current));
					} else {
						self.open.push(element);
					}
				}
				Event::Empty(start) => {
					let element = element_from(&start, true)?;
					self.push(Node::Element(element));
				}
				Event::End(end) => {
					let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
					if !self.close(&name) {
						trace!(tag = %name, "stray end tag kept as text");
						self.push(Node::Text(rest[last..current].to_string()));
					}
				}
				Event::Eof => {
					if last < rest.len() {
						self.push(Node::Text(rest[last..].to_string()));
					}
					return Ok(source.len());
				}
				_ => self.push(Node::Text(rest[last..current].to_string())),
			}

			last = current;
		}
	}

	/// Consume the content of `element` up to its end tag, starting at
	/// `start` within `rest`. Returns the offset just past the end tag.
	fn raw_text_element(&mut self, mut element: Element, rest: &str, start: usize) -> usize {
		let content = &rest[start..];
		let closing = format!("</{}", element.name.to_ascii_lowercase());
		let lowered = content.to_ascii_lowercase();

		let Some(end) = lowered.find(&closing) else {
			element.children.push(Node::Text(content.to_string()));
			element.end_tag = false;
			self.push(Node::Element(element));
			return rest.len();
		};

		if end > 0 {
			element.children.push(Node::Text(content[..end].to_string()));
		}
		element.end_tag = true;
		self.push(Node::Element(element));

		let after = content[end..].find('>').map_or(content.len(), |index| end + index + 1);
		start + after
	}
}

fn is_tag_name(name: &[u8]) -> bool {
	name.first().is_some_and(u8::is_ascii_alphabetic)
}

fn position(position: u64) -> usize {
	usize::try_from(position).unwrap_or(usize::MAX)
}

fn element_from(start: &BytesStart<'_>, self_closing: bool) -> ModstyleResult<Element> {
	let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
	let mut attributes = Vec::new();

	for attribute in start.html_attributes().with_checks(false) {
		let attribute = attribute.map_err(|error| {
			ModstyleError::Markup(format!("invalid attribute on `<{name}>`: {error}"))
		})?;
		let raw = String::from_utf8_lossy(&attribute.value).into_owned();
		// Unknown named references such as `&nbsp;` are kept as written.
		let value = unescape(&raw).map_or_else(|_| raw.clone(), Cow::into_owned);
		attributes.push(Attribute {
			name: String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
			value,
			raw: Some(raw),
		});
	}

	Ok(Element {
		name,
		attributes,
		children: Vec::new(),
		self_closing,
		end_tag: !self_closing,
	})
}
