use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use modstyle_cli::Commands;
use modstyle_cli::ModstyleCli;
use modstyle_cli::OutputFormat;
use modstyle_core::DEFAULT_OUT_DIR;
use modstyle_core::ModstyleConfig;
use modstyle_core::TransformOptions;
use modstyle_core::process_stylesheet;
use modstyle_core::project::ScanOptions;
use modstyle_core::project::collect_documents;
use modstyle_core::resolve::read_source;
use modstyle_core::transform_file;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
	let args = match ModstyleCli::try_parse() {
		Ok(args) => args,
		Err(error) => {
			let _ = error.print();
			// `--help` and `--version` are reported through the error path.
			process::exit(i32::from(error.use_stderr()));
		}
	};

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Transform { input, output }) => run_transform(&args, input, output.as_deref()),
		Some(Commands::Build {
			inputs,
			out_dir,
			watch,
		}) => run_build(&args, inputs, out_dir.as_deref(), *watch),
		Some(Commands::Tokens { stylesheet, format }) => run_tokens(&args, stylesheet, *format),
		None => {
			eprintln!("No subcommand specified. Run `modstyle --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<modstyle_core::ModstyleError>() {
			Ok(modstyle_err) => {
				let report: miette::Report = (*modstyle_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Logs go to stderr. `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init();
}

fn resolve_root(args: &ModstyleCli) -> PathBuf {
	let root = args
		.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
	std::path::absolute(&root).unwrap_or(root)
}

/// Load `modstyle.toml` (if any) and build the transform options for `root`.
fn load_options(root: &Path) -> Result<(Option<ModstyleConfig>, TransformOptions), Box<dyn std::error::Error>> {
	let config = ModstyleConfig::load(root)?;
	if let Some(path) = ModstyleConfig::resolve_path(root) {
		debug!(config = %path.display(), "loaded config");
	}
	let options = TransformOptions::from_config(root, config.as_ref())?;
	Ok((config, options))
}

fn run_init(args: &ModstyleCli) -> CliResult {
	let root = resolve_root(args);

	if let Some(existing) = ModstyleConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let sample_config = "# modstyle configuration\n\n# How local names are turned into scoped \
	                     names. Placeholders: [local], [name],\n# [ext], [path], [folder], \
	                     [hash], [hash:N], [hash:hex:N], [hash:base64:N].\n# When unset the name \
	                     is `_<relative path>__<local>`.\n# generate_scoped_name = \
	                     \"[name]__[local]___[hash:base64:5]\"\n\n# Extension passes run after \
	                     scoping, in order.\n# plugins = [\"strip-comments\"]\n\n# Which nodes \
	                     carry styles and which attributes are read.\n# [selectors]\n# link = \
	                     \"link[module][href]\"\n# style = \"style[module]\"\n# class_name = \
	                     \"classname\"\n# marker = \"module\"\n# reference = \"href\"\n\n# Settings \
	                     for `modstyle build`.\n# [build]\n# include = [\"**/*.html\"]\n# exclude \
	                     = [\"dist/\"]\n# out_dir = \"dist\"\n";

	let config_path = root.join("modstyle.toml");
	std::fs::write(&config_path, sample_config)?;
	println!("Created modstyle.toml");
	println!();
	println!("Next steps:");
	println!("  1. Mark a stylesheet as a module: <style module>.title {{ color: red }}</style>");
	println!("  2. Refer to its classes: <h1 classname=\"title\">Hello</h1>");
	println!("  3. Run `modstyle build` to write the scoped documents");

	Ok(())
}

fn run_transform(args: &ModstyleCli, input: &Path, output: Option<&Path>) -> CliResult {
	let root = resolve_root(args);
	let (_, options) = load_options(&root)?;
	let input = std::path::absolute(input)?;

	let runtime = tokio::runtime::Runtime::new()?;
	let html = runtime.block_on(transform_file(&input, &options))?;

	match output {
		Some(output) => {
			write_output(output, &html)?;
			if args.verbose {
				println!("Wrote {}", output.display());
			}
		}
		None => print!("{html}"),
	}

	Ok(())
}

fn run_build(args: &ModstyleCli, inputs: &[PathBuf], out_dir: Option<&Path>, watch: bool) -> CliResult {
	let root = resolve_root(args);
	let (config, _) = load_options(&root)?;
	let out_dir = out_dir
		.map(Path::to_path_buf)
		.or_else(|| config.as_ref().and_then(|config| config.build.out_dir.clone()))
		.unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
	let out_dir = if out_dir.is_absolute() {
		out_dir
	} else {
		root.join(out_dir)
	};

	run_build_once(args, &root, inputs, &out_dir)?;

	if !watch {
		return Ok(());
	}

	// Watch mode
	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let (tx, rx) = mpsc::channel();
	let ignored = out_dir.clone();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				// Writes into the output directory would retrigger the build.
				let relevant = event.paths.iter().any(|path| !path.starts_with(&ignored));
				if relevant
					&& matches!(
						event.kind,
						notify::EventKind::Modify(_)
							| notify::EventKind::Create(_)
							| notify::EventKind::Remove(_)
					) {
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		println!("\nFile change detected, rebuilding...");
		if let Err(e) = run_build_once(args, &root, inputs, &out_dir) {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

/// Transform every document once. The config is reloaded so that edits to
/// `modstyle.toml` apply in watch mode.
fn run_build_once(args: &ModstyleCli, root: &Path, inputs: &[PathBuf], out_dir: &Path) -> CliResult {
	let (config, options) = load_options(root)?;

	let documents = if inputs.is_empty() {
		let scan = ScanOptions::from_config(config.as_ref())?.skip_dir(out_dir);
		collect_documents(root, &scan)?
	} else {
		inputs
			.iter()
			.map(std::path::absolute)
			.collect::<Result<Vec<_>, _>>()?
	};

	if documents.is_empty() {
		println!("No documents found.");
		return Ok(());
	}

	let runtime = tokio::runtime::Runtime::new()?;
	let mut written = Vec::with_capacity(documents.len());

	for document in &documents {
		debug!(document = %document.display(), "building document");
		let html = runtime.block_on(transform_file(document, &options))?;
		let relative = output_relative_path(document, root);
		let target = out_dir.join(&relative);
		write_output(&target, &html)?;
		written.push(relative);
	}

	println!(
		"{} {} document(s) into {}",
		colored!("Built", green),
		written.len(),
		make_relative(out_dir, root)
	);

	if args.verbose {
		for relative in &written {
			println!("  {}", relative.display());
		}
	}

	Ok(())
}

/// The path a document is written to below the output directory. Documents
/// outside the root keep only their file name.
fn output_relative_path(document: &Path, root: &Path) -> PathBuf {
	match document.strip_prefix(root) {
		Ok(relative) => relative.to_path_buf(),
		Err(_) => document.file_name().map(PathBuf::from).unwrap_or_default(),
	}
}

fn write_output(path: &Path, content: &str) -> std::io::Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, content)
}

fn run_tokens(args: &ModstyleCli, stylesheet: &Path, format: OutputFormat) -> CliResult {
	let root = resolve_root(args);
	let (_, options) = load_options(&root)?;
	let stylesheet = std::path::absolute(stylesheet)?;

	let runtime = tokio::runtime::Runtime::new()?;
	let output = runtime.block_on(async {
		let source = read_source(&stylesheet).await?;
		process_stylesheet(&source, stylesheet.as_path(), &options).await
	})?;

	match format {
		OutputFormat::Json => {
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
		OutputFormat::Text => {
			if output.tokens.is_empty() {
				println!("No local names found in {}", make_relative(&stylesheet, &root));
				return Ok(());
			}

			println!("{}", colored!(make_relative(&stylesheet, &root), bold));
			for (local, scoped) in output.tokens.iter() {
				println!("  {local:<24} {}", scoped.join(" "));
			}

			if !output.values.is_empty() {
				println!();
				println!("{}", colored!("Constants", bold));
				for (name, value) in &output.values {
					println!("  {name:<24} {value}");
				}
			}
		}
	}

	Ok(())
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
