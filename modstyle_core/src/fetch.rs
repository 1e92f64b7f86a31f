//! Cross-file import fetching.
//!
//! A [`Session`] lives for exactly one transform invocation. It owns the
//! options, the cache of already processed stylesheets and the memoised
//! scoped names, and it is shared between the concurrently processed style
//! nodes of a document.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tracing::Instrument;
use tracing::debug;
use tracing::debug_span;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::TransformOptions;
use crate::pipeline::ModuleOutput;
use crate::pipeline::process;
use crate::resolve::normalize;
use crate::resolve::read_source;
use crate::resolve::relative_path;
use crate::resolve::resolve_reference;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// State shared by every stylesheet processed during one transform.
pub struct Session {
	options: TransformOptions,
	root: PathBuf,
	cache: Mutex<HashMap<PathBuf, Arc<ModuleOutput>>>,
	names: Mutex<HashMap<(PathBuf, String), String>>,
}

impl Session {
	/// Create a session. The configured root is made absolute.
	pub fn new(options: TransformOptions) -> ModstyleResult<Self> {
		let root = normalize(&std::path::absolute(&options.root)?);

		Ok(Self {
			options,
			root,
			cache: Mutex::new(HashMap::new()),
			names: Mutex::new(HashMap::new()),
		})
	}

	pub fn options(&self) -> &TransformOptions {
		&self.options
	}

	/// The absolute root that absolute references and names are relative to.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// The scoped name for `local` declared in `origin`. Each pair is
	/// generated once per session.
	pub(crate) fn scoped_name(&self, local: &str, origin: &Path) -> ModstyleResult<String> {
		let key = (origin.to_path_buf(), local.to_string());
		let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);

		if let Some(name) = names.get(&key) {
			return Ok(name.clone());
		}

		let name = self.options.naming.generate(local, origin, &self.root)?;
		names.insert(key, name.clone());

		Ok(name)
	}

	fn cached(&self, path: &Path) -> Option<Arc<ModuleOutput>> {
		self.cache
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(path)
			.cloned()
	}

	fn store(&self, path: PathBuf, output: Arc<ModuleOutput>) {
		self.cache
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(path, output);
	}

	/// Number of distinct stylesheets fetched so far.
	pub fn cached_len(&self) -> usize {
		self.cache
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}
}

/// The files on the current import path, outermost first. A file that is
/// already on the path cannot be entered again.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportChain {
	files: Vec<PathBuf>,
}

impl ImportChain {
	/// Start a chain at the given file. Inline content with no backing file
	/// starts an empty chain.
	pub fn starting_at(origin: &Path) -> Self {
		let files = if origin.as_os_str().is_empty() {
			Vec::new()
		} else {
			vec![origin.to_path_buf()]
		};
		Self { files }
	}

	/// Extend the chain with `path`, failing when that would close a cycle.
	pub fn enter(&self, path: &Path, root: &Path) -> ModstyleResult<Self> {
		if self.files.iter().any(|file| file == path) {
			let chain = self
				.files
				.iter()
				.map(|file| file.as_path())
				.chain(std::iter::once(path))
				.map(|file| relative_path(root, file))
				.collect::<Vec<_>>()
				.join(" -> ");
			return Err(ModstyleError::CircularComposition { chain });
		}

		let mut files = self.files.clone();
		files.push(path.to_path_buf());
		Ok(Self { files })
	}
}

/// Resolve `reference` relative to `from`, then process the target file and
/// return its exports. Completed targets are cached for the session, so a
/// stylesheet imported from several places is read and processed once.
pub(crate) fn fetch<'a>(
	session: &'a Session,
	reference: &'a str,
	from: &'a Path,
	chain: &'a ImportChain,
) -> BoxFuture<'a, ModstyleResult<Arc<ModuleOutput>>> {
	let span = debug_span!("fetch", reference, from = %from.display());

	Box::pin(
		async move {
			let path = resolve_reference(reference, session.root(), from);
			let chain = chain.enter(&path, session.root())?;

			if let Some(output) = session.cached(&path) {
				debug!(path = %path.display(), "import served from cache");
				return Ok(output);
			}

			let source = read_source(&path).await?;
			let output = Arc::new(process(session, source, path.clone(), chain).await?);
			session.store(path, Arc::clone(&output));

			Ok(output)
		}
		.instrument(span),
	)
}
