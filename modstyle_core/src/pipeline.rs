//! The css modules pipeline.
//!
//! ```text
//! source
//!   → values       (@value constants, imported constants)
//!   → local_scope  (mark local classes, ids and keyframes)
//!   → imports      (resolve `composes` against other files)
//!   → scope        (generate scoped names, build the token map)
//!   → passes       (caller supplied extensions)
//! ```

use std::path::PathBuf;

use derive_more::Deref;
use serde::Serialize;
use serde::ser::SerializeMap;
use tracing::Instrument;
use tracing::debug;
use tracing::debug_span;

use crate::ModstyleResult;
use crate::fetch::BoxFuture;
use crate::fetch::ImportChain;
use crate::fetch::Session;
use crate::imports;
use crate::local_scope;
use crate::resolve::relative_path;
use crate::scope;
use crate::stylesheet::Stylesheet;
use crate::values;

/// Exported local names in order of first appearance, each mapped to its
/// scoped name followed by the names it composes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct TokenMap(Vec<(String, Vec<String>)>);

impl TokenMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&[String]> {
		self.0
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, values)| values.as_slice())
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(key, _)| key.as_str())
	}

	/// Insert or replace an entry. New keys go to the end.
	pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
		let name = name.into();
		match self.0.iter_mut().find(|(key, _)| *key == name) {
			Some((_, existing)) => *existing = values,
			None => self.0.push((name, values)),
		}
	}

	/// The space separated class string for `name`.
	pub fn class_string(&self, name: &str) -> Option<String> {
		self.get(name).map(|values| values.join(" "))
	}
}

impl FromIterator<(String, Vec<String>)> for TokenMap {
	fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
		let mut map = Self::new();
		for (key, values) in iter {
			map.insert(key, values);
		}
		map
	}
}

impl Serialize for TokenMap {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for (key, values) in &self.0 {
			map.serialize_entry(key, &values.join(" "))?;
		}
		map.end()
	}
}

/// The result of running the pipeline over one stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleOutput {
	/// The rewritten stylesheet text.
	pub css: String,
	pub tokens: TokenMap,
	/// `@value` constants visible in the stylesheet, defined or imported.
	#[serde(serialize_with = "serialize_pairs")]
	pub values: Vec<(String, String)>,
}

impl ModuleOutput {
	pub fn value(&self, name: &str) -> Option<&str> {
		self.values
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}
}

fn serialize_pairs<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	let mut map = serializer.serialize_map(Some(pairs.len()))?;
	for (key, value) in pairs {
		map.serialize_entry(key, value)?;
	}
	map.end()
}

/// Run every stage over `source`, which was read from `origin` (empty for
/// inline content).
pub(crate) fn process<'a>(
	session: &'a Session,
	source: String,
	origin: PathBuf,
	chain: ImportChain,
) -> BoxFuture<'a, ModstyleResult<ModuleOutput>> {
	let label = relative_path(session.root(), &origin);
	let span = debug_span!("process", origin = %label);

	Box::pin(
		async move {
			let mut sheet = Stylesheet::parse(&source, &label)?;

			let values = values::run(&mut sheet, session, &origin, &chain).await?;
			local_scope::run(&mut sheet)?;
			imports::run(&mut sheet, session, &origin, &chain).await?;
			let tokens = scope::run(&mut sheet, session, &origin)?;

			for pass in &session.options().passes {
				debug!(pass = pass.name(), "running extension pass");
				pass.run(&mut sheet, &tokens)?;
			}

			Ok(ModuleOutput {
				css: sheet.to_css(),
				tokens,
				values,
			})
		}
		.instrument(span),
	)
}

/// Process a standalone stylesheet with a fresh session.
pub async fn process_stylesheet(
	source: &str,
	origin: impl Into<PathBuf>,
	options: &crate::TransformOptions,
) -> ModstyleResult<ModuleOutput> {
	let session = Session::new(options.clone())?;
	let origin = crate::resolve::resolve_origin(session.root(), &origin.into());
	let chain = ImportChain::starting_at(&origin);
	process(&session, source.to_string(), origin, chain).await
}
