//! The document rewriter.
//!
//! Style nodes move through `Discovered → ContentResolved → Transformed →
//! Substituted → Finalized`. Everything up to `Transformed` runs as one task
//! per node on a [`JoinSet`]. The document is only touched after every task
//! has succeeded. The first failure in document order fails the whole
//! transform and no partial document is produced.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::TransformOptions;
use crate::document::Document;
use crate::document::Element;
use crate::document::Node;
use crate::document::NodeId;
use crate::fetch::ImportChain;
use crate::fetch::Session;
use crate::fetch::fetch;
use crate::matcher::MatchSelector;
use crate::pipeline::ModuleOutput;
use crate::pipeline::TokenMap;
use crate::pipeline::process;
use crate::resolve::read_source;
use crate::resolve::resolve_origin;

/// Where the stylesheet of a discovered node comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StyleSource {
	Linked(String),
	Inline(String),
}

/// Transform every style node of `document`.
///
/// With no style nodes the document is returned as is. Any failure fails the
/// whole transform.
#[instrument(level = "debug", skip_all, fields(from = %options.from.display()))]
pub async fn transform(mut document: Document, options: &TransformOptions) -> ModstyleResult<Document> {
	let link = MatchSelector::parse(&options.selectors.link)?;
	let style = MatchSelector::parse(&options.selectors.style)?;

	let candidates = discover(&document, &link, &style, &options.selectors.reference);
	if candidates.is_empty() {
		debug!("no style nodes found");
		return Ok(document);
	}

	let session = Arc::new(Session::new(options.clone())?);
	let mut tasks = JoinSet::new();

	for (index, (id, source)) in candidates.iter().enumerate() {
		trace!(node = ?id, state = "discovered");
		let session = Arc::clone(&session);
		let source = source.clone();
		tasks.spawn(async move { (index, run_node(&session, source).await) });
	}

	let mut results: Vec<Option<ModstyleResult<ModuleOutput>>> = Vec::new();
	results.resize_with(candidates.len(), || None);

	while let Some(joined) = tasks.join_next().await {
		let (index, result) = joined.map_err(|error| ModstyleError::Task(error.to_string()))?;
		results[index] = Some(result);
	}

	let mut outputs = Vec::with_capacity(candidates.len());
	for result in results {
		let Some(result) = result else {
			return Err(ModstyleError::Task("style node task did not complete".to_string()));
		};
		outputs.push(result?);
	}

	for ((id, _), output) in candidates.iter().zip(&outputs) {
		substitute(&mut document, &output.tokens, &options.selectors.class_name);
		trace!(node = ?id, state = "substituted");
		finalize(&mut document, id, &output.css, options);
		trace!(node = ?id, state = "finalized");
	}

	let class_name = &options.selectors.class_name;
	if !class_name.eq_ignore_ascii_case("class") {
		document.for_each_element_mut(&mut |element| {
			element.remove_attr(class_name);
		});
	}

	debug!(nodes = candidates.len(), imports = session.cached_len(), "transformed document");
	Ok(document)
}

/// Parse, transform and render markup in one step.
pub async fn transform_str(source: &str, options: &TransformOptions) -> ModstyleResult<String> {
	let document = Document::parse(source)?;
	Ok(transform(document, options).await?.render())
}

/// Find the style nodes in document order. A node matching the link
/// selector takes its stylesheet from the reference attribute, any other
/// match from its own text.
fn discover(
	document: &Document,
	link: &MatchSelector,
	style: &MatchSelector,
	reference: &str,
) -> Vec<(NodeId, StyleSource)> {
	let mut ids = document.select(link);
	ids.extend(document.select(style));
	ids.sort();
	ids.dedup();

	ids.into_iter()
		.filter_map(|id| {
			let element = document.element(&id)?;
			let source = match element.attr(reference) {
				Some(href) if link.matches(element) => StyleSource::Linked(href.to_string()),
				_ => StyleSource::Inline(element.text()),
			};
			Some((id, source))
		})
		.collect()
}

/// Resolve and transform one style node. Linked stylesheets go through the
/// session cache, so a file linked from several nodes is processed once.
async fn run_node(session: &Session, source: StyleSource) -> ModstyleResult<ModuleOutput> {
	let options = session.options();

	let output = match source {
		StyleSource::Linked(href) => {
			let output = fetch(session, &href, &options.from, &ImportChain::default()).await?;
			ModuleOutput::clone(&output)
		}
		StyleSource::Inline(text) => {
			let origin = resolve_origin(session.root(), &options.from);
			trace!(origin = %origin.display(), state = "content_resolved");
			let chain = ImportChain::starting_at(&origin);
			process(session, text, origin, chain).await?
		}
	};
	trace!(tokens = output.tokens.len(), state = "transformed");

	Ok(output)
}

/// Add the scoped names of every matching local name to the class
/// attribute of each element that references it.
fn substitute(document: &mut Document, tokens: &TokenMap, class_name: &str) {
	let in_place = class_name.eq_ignore_ascii_case("class");

	for (local, scoped) in tokens.iter() {
		document.for_each_element_mut(&mut |element| {
			let referenced = element
				.attr(class_name)
				.is_some_and(|value| value.split_whitespace().any(|word| word == local.as_str()));
			if !referenced {
				return;
			}

			if in_place {
				replace_class(element, local, scoped);
			} else {
				append_classes(element, scoped);
			}
		});
	}
}

fn append_classes(element: &mut Element, scoped: &[String]) {
	let mut classes: Vec<String> = element
		.attr("class")
		.map(|value| value.split_whitespace().map(str::to_string).collect())
		.unwrap_or_default();

	for name in scoped {
		if !classes.contains(name) {
			classes.push(name.clone());
		}
	}

	element.set_attr("class", classes.join(" "));
}

fn replace_class(element: &mut Element, local: &str, scoped: &[String]) {
	let mut classes: Vec<String> = Vec::new();

	for word in element.attr("class").unwrap_or_default().split_whitespace() {
		let replacement: &[String] = if word == local { scoped } else { &[] };
		if replacement.is_empty() {
			if !classes.iter().any(|class| class == word) {
				classes.push(word.to_string());
			}
			continue;
		}
		for name in replacement {
			if !classes.contains(name) {
				classes.push(name.clone());
			}
		}
	}

	element.set_attr("class", classes.join(" "));
}

/// Turn the style node into a plain `<style>` holding the generated css.
fn finalize(document: &mut Document, id: &NodeId, css: &str, options: &TransformOptions) {
	let Some(element) = document.element_mut(id) else {
		return;
	};

	element.remove_attr(&options.selectors.marker);
	element.remove_attr(&options.selectors.reference);
	element.name = "style".to_string();
	element.self_closing = false;
	element.end_tag = true;
	element.children = vec![Node::Text(css.to_string())];
}

/// Transform a document read from `path`, resolving its linked stylesheets
/// relative to it.
pub async fn transform_file(path: impl Into<PathBuf>, options: &TransformOptions) -> ModstyleResult<String> {
	let path = path.into();
	let source = read_source(&path).await?;
	let options = options.clone().with_from(path);
	transform_str(&source, &options).await
}
