use std::ops::Range;

use logos::Logos;

/// Raw tokens produced by logos for flat tokenization of stylesheet text.
///
/// The token set is just rich enough to find statement boundaries. Every
/// byte of the input belongs to exactly one token so that slicing the source
/// by token spans reproduces it verbatim.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CssToken {
	#[regex(r"[ \t\r\n\f]+")]
	Whitespace,
	#[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
	Comment,
	/// A comment that runs to the end of the input. Only ever produced at
	/// the end, where it is longer than any other match.
	#[regex(r"/\*([^*]|\*+[^*/])*\**")]
	UnterminatedComment,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\\n]|\\.)*'")]
	SingleQuotedString,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token(";")]
	Semicolon,
	#[token(":")]
	Colon,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token(",")]
	Comma,
	#[regex(r"@[a-zA-Z_-][a-zA-Z0-9_-]*")]
	AtKeyword,
	#[regex(r#"[^ \t\r\n\f{};:(),"'/@]+"#)]
	Word,
	#[token("/")]
	Slash,
	#[token("@")]
	At,
}

/// A token together with the byte range it covers in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpannedToken {
	pub kind: CssToken,
	pub span: Range<usize>,
}

impl CssToken {
	pub fn is_trivia(self) -> bool {
		matches!(self, Self::Whitespace | Self::Comment)
	}
}

/// Tokenize stylesheet text. Bytes that logos cannot match (an unterminated
/// string or comment) are reported through `Err` with the offending offset.
pub(crate) fn tokenize(source: &str) -> Result<Vec<SpannedToken>, usize> {
	let mut tokens = Vec::new();

	for (result, span) in CssToken::lexer(source).spanned() {
		let Ok(kind) = result else {
			return Err(span.start);
		};
		if kind == CssToken::UnterminatedComment {
			return Err(span.start);
		}
		tokens.push(SpannedToken { kind, span });
	}

	Ok(tokens)
}
