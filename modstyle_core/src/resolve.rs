//! Style source resolution.
//!
//! References written in markup (`href`) and in stylesheets (`from "..."`)
//! are resolved lexically: a reference that starts with `/` is taken from the
//! root, anything else from the directory of the file that mentions it. No
//! package lookup is performed.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tracing::trace;

use crate::ModstyleError;
use crate::ModstyleResult;

/// Resolve `reference` as seen from `from` within `root`.
///
/// `from` is the file doing the referencing. When it is empty (inline
/// content with no backing file) relative references resolve against the
/// root.
pub fn resolve_reference(reference: &str, root: &Path, from: &Path) -> PathBuf {
	let reference = unquote(reference);

	let joined = if let Some(stripped) = reference.strip_prefix('/') {
		root.join(stripped)
	} else {
		let base = if from.as_os_str().is_empty() {
			root.to_path_buf()
		} else {
			let from = if from.is_absolute() {
				from.to_path_buf()
			} else {
				root.join(from)
			};
			from.parent().map_or_else(|| root.to_path_buf(), Path::to_path_buf)
		};
		base.join(&*reference)
	};

	let resolved = normalize(&joined);
	trace!(reference = %reference, resolved = %resolved.display(), "resolved style reference");
	resolved
}

/// Resolve the origin of an inline style node. Relative `from` paths are
/// taken from the root.
pub fn resolve_origin(root: &Path, from: &Path) -> PathBuf {
	if from.as_os_str().is_empty() {
		PathBuf::new()
	} else if from.is_absolute() {
		normalize(from)
	} else {
		normalize(&root.join(from))
	}
}

/// Remove surrounding quotes from a reference and unescape its contents.
pub(crate) fn unquote(reference: &str) -> std::borrow::Cow<'_, str> {
	let trimmed = reference.trim();
	let quoted = trimmed.len() >= 2
		&& ((trimmed.starts_with('"') && trimmed.ends_with('"'))
			|| (trimmed.starts_with('\'') && trimmed.ends_with('\'')));

	if !quoted {
		return std::borrow::Cow::Borrowed(trimmed);
	}

	match snailquote::unescape(trimmed) {
		Ok(unescaped) => std::borrow::Cow::Owned(unescaped),
		Err(_) => std::borrow::Cow::Borrowed(&trimmed[1..trimmed.len() - 1]),
	}
}

/// Lexically normalise a path: drop `.` segments and pop on `..`.
pub fn normalize(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if !normalized.pop() {
					normalized.push("..");
				}
			}
			other => normalized.push(other.as_os_str()),
		}
	}

	normalized
}

/// `path` relative to `root`, with forward slashes. An empty path stays
/// empty.
pub fn relative_path(root: &Path, path: &Path) -> String {
	if path.as_os_str().is_empty() {
		return String::new();
	}

	let relative = match path.strip_prefix(root) {
		Ok(stripped) => stripped.to_path_buf(),
		Err(_) if path.is_relative() => path.to_path_buf(),
		Err(_) => {
			let path_components: Vec<_> = path.components().collect();
			let root_components: Vec<_> = root.components().collect();
			let common = path_components
				.iter()
				.zip(&root_components)
				.take_while(|(a, b)| a == b)
				.count();

			let mut relative = PathBuf::new();
			for _ in common..root_components.len() {
				relative.push("..");
			}
			for component in &path_components[common..] {
				relative.push(component.as_os_str());
			}
			relative
		}
	};

	relative.to_string_lossy().replace('\\', "/")
}

/// Read a style source from disk.
pub async fn read_source(path: &Path) -> ModstyleResult<String> {
	tokio::fs::read_to_string(path).await.map_err(|source| {
		ModstyleError::Read {
			path: path.display().to_string(),
			source,
		}
	})
}
