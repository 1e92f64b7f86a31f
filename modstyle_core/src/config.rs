use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::matcher::MatchSelector;
use crate::naming::NamingStrategy;
use crate::passes::Pass;
use crate::passes::builtin_pass;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["modstyle.toml", ".modstyle.toml", ".config/modstyle.toml"];

/// Output directory used by `build` when neither the command line nor the
/// config file names one.
pub const DEFAULT_OUT_DIR: &str = "dist";

pub const DEFAULT_LINK_SELECTOR: &str = "link[module][href]";
pub const DEFAULT_STYLE_SELECTOR: &str = "style[module]";
pub const DEFAULT_CLASS_NAME_ATTRIBUTE: &str = "classname";
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "module";
pub const DEFAULT_REFERENCE_ATTRIBUTE: &str = "href";

/// Configuration loaded from a `modstyle.toml` file.
///
/// ```toml
/// generate_scoped_name = "[name]__[local]___[hash:base64:5]"
/// plugins = ["strip-comments"]
///
/// [selectors]
/// link = "link[module][href]"
/// style = "style[module]"
/// class_name = "classname"
/// marker = "module"
/// reference = "href"
///
/// [build]
/// include = ["**/*.html"]
/// exclude = ["dist/"]
/// out_dir = "dist"
/// disable_gitignore = false
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ModstyleConfig {
	/// Naming template. When absent the built-in
	/// `_<path>__<local>` form is used.
	#[serde(default)]
	pub generate_scoped_name: Option<NamingStrategy>,
	/// Names of built-in extension passes, run in order.
	#[serde(default)]
	pub plugins: Vec<String>,
	#[serde(default)]
	pub selectors: SelectorConfig,
	#[serde(default)]
	pub build: BuildConfig,
}

/// Which nodes carry styles and which attributes are read and written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
	/// Elements whose stylesheet lives in a file named by `reference`.
	pub link: String,
	/// Elements whose stylesheet is their own text content.
	pub style: String,
	/// The attribute holding local class names in markup.
	pub class_name: String,
	/// The attribute that marks a node as a style carrier.
	pub marker: String,
	/// The attribute holding a linked stylesheet path.
	pub reference: String,
}

impl Default for SelectorConfig {
	fn default() -> Self {
		Self {
			link: DEFAULT_LINK_SELECTOR.to_string(),
			style: DEFAULT_STYLE_SELECTOR.to_string(),
			class_name: DEFAULT_CLASS_NAME_ATTRIBUTE.to_string(),
			marker: DEFAULT_MARKER_ATTRIBUTE.to_string(),
			reference: DEFAULT_REFERENCE_ATTRIBUTE.to_string(),
		}
	}
}

/// Settings for the `build` command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
	/// Glob patterns, relative to the root, for documents to transform.
	/// Defaults to every `.html` and `.htm` file.
	#[serde(default)]
	pub include: Vec<String>,
	/// Gitignore-style patterns for files and directories to skip.
	#[serde(default)]
	pub exclude: Vec<String>,
	#[serde(default)]
	pub out_dir: Option<PathBuf>,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
}

impl ModstyleConfig {
	/// Return the first existing config file path for `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config for `root`. Returns `Ok(None)` when no config file
	/// exists.
	pub fn load(root: &Path) -> ModstyleResult<Option<ModstyleConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> ModstyleResult<ModstyleConfig> {
		toml::from_str(content).map_err(|e| ModstyleError::ConfigParse(e.to_string()))
	}
}

/// The immutable options for one transform.
///
/// A run never mutates its options. Per-run state such as the import cache
/// lives in a [`Session`](crate::Session).
#[derive(Clone)]
pub struct TransformOptions {
	/// Base for absolute references and for the path part of generated names.
	pub root: PathBuf,
	/// The document being processed. Relative references in linked nodes
	/// resolve against its directory. Empty when unknown.
	pub from: PathBuf,
	pub naming: NamingStrategy,
	pub passes: Vec<Arc<dyn Pass>>,
	pub selectors: SelectorConfig,
}

impl fmt::Debug for TransformOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransformOptions")
			.field("root", &self.root)
			.field("from", &self.from)
			.field("naming", &self.naming)
			.field(
				"passes",
				&self.passes.iter().map(|pass| pass.name()).collect::<Vec<_>>(),
			)
			.field("selectors", &self.selectors)
			.finish()
	}
}

impl Default for TransformOptions {
	fn default() -> Self {
		Self::new(".")
	}
}

impl TransformOptions {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			from: PathBuf::new(),
			naming: NamingStrategy::Default,
			passes: Vec::new(),
			selectors: SelectorConfig::default(),
		}
	}

	/// Build options for `root` from a loaded config file.
	pub fn from_config(root: impl Into<PathBuf>, config: Option<&ModstyleConfig>) -> ModstyleResult<Self> {
		let mut options = Self::new(root);
		let Some(config) = config else {
			return Ok(options);
		};

		if let Some(naming) = &config.generate_scoped_name {
			options.naming = naming.clone();
		}
		for name in &config.plugins {
			options.passes.push(builtin_pass(name)?);
		}
		options.selectors = config.selectors.clone();
		options.validate()?;

		Ok(options)
	}

	#[must_use]
	pub fn with_from(mut self, from: impl Into<PathBuf>) -> Self {
		self.from = from.into();
		self
	}

	#[must_use]
	pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
		self.naming = naming;
		self
	}

	#[must_use]
	pub fn with_pass(mut self, pass: impl Pass + 'static) -> Self {
		self.passes.push(Arc::new(pass));
		self
	}

	#[must_use]
	pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
		self.selectors = selectors;
		self
	}

	/// Check that the configured selectors parse.
	pub fn validate(&self) -> ModstyleResult<()> {
		MatchSelector::parse(&self.selectors.link)?;
		MatchSelector::parse(&self.selectors.style)?;
		Ok(())
	}
}
