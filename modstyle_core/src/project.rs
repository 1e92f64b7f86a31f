//! Document discovery for whole-project builds.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use tracing::debug;

use crate::BuildConfig;
use crate::ModstyleConfig;
use crate::ModstyleError;
use crate::ModstyleResult;

/// Documents transformed when `[build] include` is empty.
pub const DEFAULT_INCLUDE_PATTERNS: [&str; 2] = ["**/*.html", "**/*.htm"];

/// Options that control which documents a build picks up.
#[derive(Debug, Clone)]
pub struct ScanOptions {
	pub include_set: GlobSet,
	/// Gitignore-style patterns to skip.
	pub exclude_patterns: Vec<String>,
	pub disable_gitignore: bool,
	/// Directories that are never scanned, such as the output directory.
	pub skip_dirs: Vec<PathBuf>,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			include_set: default_include_set(),
			exclude_patterns: Vec::new(),
			disable_gitignore: false,
			skip_dirs: Vec::new(),
		}
	}
}

impl ScanOptions {
	/// Build scan options from an optional config.
	pub fn from_config(config: Option<&ModstyleConfig>) -> ModstyleResult<Self> {
		let Some(config) = config else {
			return Ok(Self::default());
		};
		Self::from_build_config(&config.build)
	}

	pub fn from_build_config(build: &BuildConfig) -> ModstyleResult<Self> {
		let include_set = if build.include.is_empty() {
			default_include_set()
		} else {
			build_glob_set(&build.include)?
		};

		Ok(Self {
			include_set,
			exclude_patterns: build.exclude.clone(),
			disable_gitignore: build.disable_gitignore,
			skip_dirs: Vec::new(),
		})
	}

	#[must_use]
	pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.skip_dirs.push(dir.into());
		self
	}
}

fn default_include_set() -> GlobSet {
	let patterns: Vec<String> = DEFAULT_INCLUDE_PATTERNS.iter().map(ToString::to_string).collect();
	build_glob_set(&patterns).unwrap_or_else(|_| GlobSet::empty())
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> ModstyleResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			ModstyleError::ConfigParse(format!("invalid include pattern `{pattern}`: {e}"))
		})?;
		builder.add(glob);
	}
	builder
		.build()
		.map_err(|e| ModstyleError::ConfigParse(format!("failed to build include rules: {e}")))
}

/// Build a `Gitignore` matcher from `[build] exclude` patterns.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> ModstyleResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			ModstyleError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| ModstyleError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Every document under `root` matched by the include patterns and not
/// excluded, sorted.
pub fn collect_documents(root: &Path, options: &ScanOptions) -> ModstyleResult<Vec<PathBuf>> {
	let gitignore = if options.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let exclude = build_exclude_matcher(root, &options.exclude_patterns)?;

	let walker = Walker {
		root,
		options,
		gitignore: &gitignore,
		exclude: &exclude,
	};
	let mut files = Vec::new();
	let mut visited = HashSet::new();
	walker.walk(root, &mut files, &mut visited)?;

	files.sort();
	debug!(root = %root.display(), documents = files.len(), "collected documents");
	Ok(files)
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

struct Walker<'a> {
	root: &'a Path,
	options: &'a ScanOptions,
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
}

impl Walker<'_> {
	fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> ModstyleResult<()> {
		// Symlinked directories may loop back on themselves.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !visited.insert(canonical) {
			return Ok(());
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();

			if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
				if is_ignored_directory_name(name) {
					continue;
				}
			}

			let is_dir = path.is_dir();
			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				if self.options.skip_dirs.iter().any(|skip| path.starts_with(skip)) {
					continue;
				}
				self.walk(&path, files, visited)?;
			} else if let Ok(relative) = path.strip_prefix(self.root) {
				if self.options.include_set.is_match(relative) {
					files.push(path);
				}
			}
		}

		Ok(())
	}
}
