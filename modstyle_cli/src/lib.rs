use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Locally scoped css modules for html documents, resolved at build time.",
	long_about = "modstyle rewrites html documents that carry css modules. Stylesheets attached \
	              with `<style module>` or `<link module href=\"...\">` have their class names, \
	              ids and keyframes replaced with generated names, and elements that refer to \
	              those names through a `classname` attribute receive the generated names in \
	              their `class` attribute.\n\nQuick start:\n  modstyle init       Create a \
	              modstyle.toml\n  modstyle transform  Rewrite one document\n  modstyle build    \
	              Rewrite every document in the project\n  modstyle tokens     Show the names a \
	              stylesheet exports"
)]
pub struct ModstyleCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory. Absolute style references and
	/// generated names are relative to it.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a commented `modstyle.toml` in the project root.
	///
	/// If a config file already exists this command is a no-op and exits
	/// successfully.
	Init,
	/// Rewrite a single html document.
	///
	/// Linked stylesheets are resolved relative to the document. The result
	/// is written to `--output` or printed to stdout.
	Transform {
		/// The document to transform.
		input: PathBuf,

		/// Write the transformed document here instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
	/// Rewrite documents into an output directory.
	///
	/// Without inputs every document matched by `[build] include` (default
	/// `**/*.html` and `**/*.htm`) is transformed. Each output keeps its path
	/// relative to the project root.
	Build {
		/// Documents to transform. Defaults to every discovered document.
		inputs: Vec<PathBuf>,

		/// Output directory. Defaults to `[build] out_dir`, then `dist`.
		#[arg(long)]
		out_dir: Option<PathBuf>,

		/// Watch the project and rebuild whenever a file changes.
		#[arg(long, default_value_t = false)]
		watch: bool,
	},
	/// Run the pipeline over one stylesheet and print the names it exports.
	Tokens {
		/// The stylesheet to process.
		stylesheet: PathBuf,

		/// Output format. `json` includes the generated css and the `@value`
		/// constants.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
