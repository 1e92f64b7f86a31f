use std::path::Path;

use crate::TransformOptions;
use crate::naming::NamingStrategy;

/// Options that append `-test` to every local name, rooted at `root`.
pub fn test_options(root: &Path) -> TransformOptions {
	TransformOptions::new(root).with_naming(suffix_naming())
}

pub fn suffix_naming() -> NamingStrategy {
	NamingStrategy::template("[local]-test").unwrap_or_else(|e| panic!("template: {e}"))
}

pub fn tempdir() -> tempfile::TempDir {
	tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"))
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

pub const TEST_SPEC_CSS: &str = ".root {\n\tcolor: red;\n}\n";

pub const COMPOSE_SPEC_CSS: &str = ".compositor {\n\tfont-weight: bold;\n}\n";

pub const STYLESHEET_WITH_EVERYTHING: &str = "@charset \"utf-8\";
@import url(\"reset.css\") screen;
/* heading */
@media (max-width: 600px) {
  .a:hover > .b, .c::after { content: \"}\"; color: red; }
}
.d{color:blue}
@font-face { font-family: \"X\"; src: url(x.woff2) }
";
