//! Scoped name generation.
//!
//! A [`NamingStrategy`] turns a local identifier and the path of the file it
//! was declared in into a globally unique identifier. Generation is a pure
//! function of `(local, origin, root)`: nothing is captured from ambient
//! state, so two runs over the same input always agree.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::ModstyleError;
use crate::ModstyleResult;
use crate::resolve::relative_path;

/// Signature of a caller supplied generator: `(local, origin) -> scoped`.
pub type GenerateScopedName = dyn Fn(&str, &Path) -> String + Send + Sync;

/// How local identifiers are turned into scoped identifiers.
#[derive(Clone, Default)]
#[non_exhaustive]
pub enum NamingStrategy {
	/// `_<sanitised relative path>__<local>`.
	#[default]
	Default,
	/// A compiled naming template such as `[name]__[local]___[hash:base64:5]`.
	Template(NameTemplate),
	/// A caller supplied function. It fully replaces the built-in behaviour.
	Custom(Arc<GenerateScopedName>),
}

impl fmt::Debug for NamingStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Default => f.write_str("Default"),
			Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
			Self::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

impl NamingStrategy {
	/// Compile a naming template.
	pub fn template(template: &str) -> ModstyleResult<Self> {
		Ok(Self::Template(NameTemplate::parse(template)?))
	}

	/// Wrap a generator function.
	pub fn custom(generate: impl Fn(&str, &Path) -> String + Send + Sync + 'static) -> Self {
		Self::Custom(Arc::new(generate))
	}

	/// Generate the scoped name for `local` declared in `origin`.
	///
	/// `origin` may be empty for inline content with no backing file. Custom
	/// generators that return an empty or whitespace-bearing name produce
	/// [`ModstyleError::InvalidScopedName`].
	pub fn generate(&self, local: &str, origin: &Path, root: &Path) -> ModstyleResult<String> {
		let name = match self {
			Self::Default => default_scoped_name(local, &relative_path(root, origin)),
			Self::Template(template) => template.render(local, origin, root),
			Self::Custom(generate) => generate(local, origin),
		};

		if name.is_empty() || name.chars().any(char::is_whitespace) {
			return Err(ModstyleError::InvalidScopedName {
				local: local.to_string(),
				name,
			});
		}

		Ok(name)
	}
}

impl<'de> Deserialize<'de> for NamingStrategy {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let template = String::deserialize(deserializer)?;
		Self::template(&template).map_err(serde::de::Error::custom)
	}
}

/// The built-in name: the origin path relative to the root, without its
/// extension, with every run of non-alphanumeric characters collapsed to
/// `_`, followed by `__` and the local name.
///
/// `test/index.spec.js` + `root` gives `_test_index_spec__root`.
pub fn default_scoped_name(local: &str, relative: &str) -> String {
	let without_extension = strip_extension(relative);
	let mut sanitised = String::with_capacity(without_extension.len());
	let mut in_separator = false;

	for ch in without_extension.chars() {
		if ch.is_ascii_alphanumeric() {
			sanitised.push(ch);
			in_separator = false;
		} else if !in_separator {
			sanitised.push('_');
			in_separator = true;
		}
	}

	let sanitised = sanitised.trim_matches('_');
	format!("_{sanitised}__{local}")
}

/// Drop the final `.ext` from the last path segment, if any.
fn strip_extension(path: &str) -> &str {
	let segment_start = path.rfind(['/', '\\']).map_or(0, |index| index + 1);
	match path[segment_start..].rfind('.') {
		Some(dot) if dot > 0 => &path[..segment_start + dot],
		_ => path,
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Local,
	Name,
	Ext,
	Path,
	Folder,
	Hash { encoding: HashEncoding, length: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashEncoding {
	Hex,
	Base64,
}

/// A compiled naming template.
///
/// Supported placeholders:
///
/// - `[local]`: the local identifier
/// - `[name]`: the origin file name without extension
/// - `[ext]`: the origin file extension, including the dot
/// - `[path]`: the origin directory relative to the root, with a trailing
///   `/` when non-empty
/// - `[folder]`: the name of the origin's parent directory
/// - `[hash]`, `[hash:N]`, `[hash:hex:N]`, `[hash:base64:N]`: an `xxh3`
///   digest of the relative origin path and the local identifier,
///   optionally truncated to `N` characters
///
/// Unknown bracketed text is kept verbatim. The rendered name is escaped
/// into a valid css identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
	source: String,
	segments: Vec<Segment>,
}

impl NameTemplate {
	pub fn parse(template: &str) -> ModstyleResult<Self> {
		let mut segments = Vec::new();
		let mut rest = template;

		while let Some(open) = rest.find('[') {
			let Some(close) = rest[open..].find(']').map(|offset| open + offset) else {
				break;
			};

			if open > 0 {
				segments.push(Segment::Literal(rest[..open].to_string()));
			}

			let placeholder = &rest[open + 1..close];
			let segment = match placeholder {
				"local" => Segment::Local,
				"name" => Segment::Name,
				"ext" => Segment::Ext,
				"path" => Segment::Path,
				"folder" => Segment::Folder,
				other if other == "hash" || other.starts_with("hash:") => {
					parse_hash(template, other)?
				}
				other => Segment::Literal(format!("[{other}]")),
			};
			segments.push(segment);
			rest = &rest[close + 1..];
		}

		if !rest.is_empty() {
			segments.push(Segment::Literal(rest.to_string()));
		}

		Ok(Self {
			source: template.to_string(),
			segments,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn render(&self, local: &str, origin: &Path, root: &Path) -> String {
		let relative = relative_path(root, origin);
		let relative_path = Path::new(&relative);
		let mut out = String::new();

		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => out.push_str(text),
				Segment::Local => out.push_str(local),
				Segment::Name => {
					if let Some(stem) = relative_path.file_stem().and_then(|s| s.to_str()) {
						out.push_str(stem);
					}
				}
				Segment::Ext => {
					if let Some(ext) = relative_path.extension().and_then(|s| s.to_str()) {
						out.push('.');
						out.push_str(ext);
					}
				}
				Segment::Path => {
					let parent = relative_path
						.parent()
						.map(|p| p.to_string_lossy().replace('\\', "/"))
						.unwrap_or_default();
					if !parent.is_empty() {
						out.push_str(&parent);
						out.push('/');
					}
				}
				Segment::Folder => {
					if let Some(folder) = relative_path
						.parent()
						.and_then(Path::file_name)
						.and_then(|s| s.to_str())
					{
						out.push_str(folder);
					}
				}
				Segment::Hash { encoding, length } => {
					let digest = hash_digest(&relative, local, *encoding);
					let length = length.unwrap_or(digest.len()).min(digest.len());
					out.push_str(&digest[..length]);
				}
			}
		}

		escape_identifier(&out)
	}
}

fn parse_hash(template: &str, placeholder: &str) -> ModstyleResult<Segment> {
	let invalid = |reason: &str| {
		ModstyleError::InvalidTemplate {
			template: template.to_string(),
			reason: reason.to_string(),
		}
	};
	let parse_length = |value: &str| {
		value
			.parse::<usize>()
			.map_err(|_| invalid("hash length must be a positive integer"))
	};

	let mut fields = placeholder.split(':').skip(1);
	let segment = match (fields.next(), fields.next(), fields.next()) {
		(None, _, _) => {
			Segment::Hash {
				encoding: HashEncoding::Hex,
				length: None,
			}
		}
		(Some(encoding @ ("hex" | "base64")), length, None) => {
			Segment::Hash {
				encoding: if encoding == "hex" {
					HashEncoding::Hex
				} else {
					HashEncoding::Base64
				},
				length: length.map(parse_length).transpose()?,
			}
		}
		(Some(length), None, None) => {
			Segment::Hash {
				encoding: HashEncoding::Hex,
				length: Some(parse_length(length)?),
			}
		}
		_ => return Err(invalid("expected `[hash:<hex|base64>:<length>]`")),
	};

	Ok(segment)
}

fn hash_digest(relative: &str, local: &str, encoding: HashEncoding) -> String {
	let mut input = Vec::with_capacity(relative.len() + local.len() + 1);
	input.extend_from_slice(relative.as_bytes());
	input.push(0);
	input.extend_from_slice(local.as_bytes());
	let hash = xxh3_64(&input);

	match encoding {
		HashEncoding::Hex => format!("{hash:016x}"),
		HashEncoding::Base64 => URL_SAFE_NO_PAD.encode(hash.to_be_bytes()),
	}
}

/// Replace characters that are not valid in a css identifier with `-` and
/// guard a leading digit or `--`.
pub fn escape_identifier(name: &str) -> String {
	let escaped: String = name
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
				c
			} else {
				'-'
			}
		})
		.collect();

	let bytes = escaped.as_bytes();
	let needs_guard = match bytes {
		[first, ..] if first.is_ascii_digit() => true,
		[b'-', second, ..] if second.is_ascii_digit() || *second == b'-' => true,
		_ => false,
	};

	if needs_guard {
		format!("_{escaped}")
	} else {
		escaped
	}
}
