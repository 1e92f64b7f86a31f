use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ModstyleError {
	#[error(transparent)]
	#[diagnostic(code(modstyle::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to read stylesheet `{path}`: {source}")]
	#[diagnostic(
		code(modstyle::read),
		help("absolute references resolve against the root, relative ones against the importing file")
	)]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid stylesheet `{origin}`: {message}")]
	#[diagnostic(code(modstyle::css_syntax))]
	CssSyntax { origin: String, message: String },

	#[error("failed to parse markup: {0}")]
	#[diagnostic(code(modstyle::markup))]
	Markup(String),

	#[error("undefined constant `{name}` imported from `{path}`")]
	#[diagnostic(
		code(modstyle::undefined_constant),
		help("define it in the imported file with `@value {name}: <value>;`")
	)]
	UndefinedConstant { name: String, path: String },

	#[error("class `{name}` referenced in composes is not defined in `{origin}`")]
	#[diagnostic(
		code(modstyle::unknown_composition),
		help("define `.{name}` in the same stylesheet or import it with `from \"<path>\"`")
	)]
	UnknownComposition { name: String, origin: String },

	#[error("class `{name}` is not exported by `{path}`")]
	#[diagnostic(code(modstyle::unknown_import))]
	UnknownImport { name: String, path: String },

	#[error("circular composition: {chain}")]
	#[diagnostic(
		code(modstyle::circular_composition),
		help("stylesheets may not compose from each other in a cycle")
	)]
	CircularComposition { chain: String },

	#[error("class `{name}` composes itself through a cycle")]
	#[diagnostic(code(modstyle::circular_local_composition))]
	CircularLocalComposition { name: String },

	#[error("composition is only allowed when the selector is a single local class: `{selector}`")]
	#[diagnostic(code(modstyle::invalid_composition))]
	InvalidComposition { selector: String },

	#[error("scoped name generator returned `{name}` for `{local}`")]
	#[diagnostic(
		code(modstyle::invalid_scoped_name),
		help("generated names must be non-empty and contain no whitespace")
	)]
	InvalidScopedName { local: String, name: String },

	#[error("invalid naming template `{template}`: {reason}")]
	#[diagnostic(code(modstyle::invalid_template))]
	InvalidTemplate { template: String, reason: String },

	#[error("invalid selector `{selector}`: {reason}")]
	#[diagnostic(
		code(modstyle::invalid_selector),
		help("selectors take the form `tag[attr][attr=value]`, separated by commas")
	)]
	InvalidSelector { selector: String, reason: String },

	#[error("unknown plugin: `{0}`")]
	#[diagnostic(code(modstyle::unknown_plugin), help("available plugins: strip-comments"))]
	UnknownPlugin(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(modstyle::config_parse),
		help("check that modstyle.toml is valid TOML with [selectors] and/or [build] sections")
	)]
	ConfigParse(String),

	#[error("style node task failed: {0}")]
	#[diagnostic(code(modstyle::task))]
	Task(String),
}

pub type ModstyleResult<T> = Result<T, ModstyleError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
