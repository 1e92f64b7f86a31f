use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::document::Element;
use crate::document::Node;
use crate::naming::NameTemplate;
use crate::naming::default_scoped_name;
use crate::naming::escape_identifier;
use crate::project::ScanOptions;
use crate::project::collect_documents;
use crate::resolve::normalize;
use crate::resolve::relative_path;
use crate::resolve::resolve_reference;
use crate::selector::LocalSelector;
use crate::selector::keyframes_name;
use crate::selector::serialize_identifier;
use crate::selector::unescape_identifier;

async fn run(source: &str, options: &TransformOptions) -> ModstyleResult<String> {
	transform_str(source, options).await
}

// --- Document rewriting ---

#[tokio::test]
async fn processes_inline_style_contents() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.a {color: black} .b {color: white}</style><div classname="a b"></div>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.a-test {color: black} .b-test {color: white}</style><div class="a-test b-test"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn matches_whole_class_names_only() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.a {color: black} .ab {color: white}</style><div classname="ab"></div>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.a-test {color: black} .ab-test {color: white}</style><div class="ab-test"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn escaped_class_names_match_their_unescaped_markup() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.sm\:flex {display: flex} .a\.b {color: red} .a {color: blue}</style><div classname="sm:flex"></div><p classname="a.b a"></p>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.sm-flex-test {display: flex} .a-b-test {color: red} .a-test {color: blue}</style><div class="sm-flex-test"></div><p class="a-b-test a-test"></p>"#
	);

	Ok(())
}

#[tokio::test]
async fn custom_names_are_escaped_in_css_only() -> ModstyleResult<()> {
	let tmp = tempdir();
	let options = TransformOptions::new(tmp.path())
		.with_naming(NamingStrategy::custom(|local, _| format!("ns.{local}")));

	let html = run(
		r#"<style module>.a {color: red}</style><i classname="a"></i>"#,
		&options,
	)
	.await?;

	assert_eq!(html, r#"<style>.ns\.a {color: red}</style><i class="ns.a"></i>"#);

	Ok(())
}

#[tokio::test]
async fn text_with_bare_angle_brackets_is_left_alone() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.a {}</style><p classname="a">1 < 2 and 3 > 2</p>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(html, r#"<style>.a-test {}</style><p class="a-test">1 < 2 and 3 > 2</p>"#);

	Ok(())
}

#[tokio::test]
async fn linked_references_decode_character_references() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "a&b.css", ".x {}");
	let options = test_options(tmp.path()).with_from(tmp.path().join("index.html"));

	let html = run(r#"<link module href="./a&amp;b.css"><i classname="x"></i>"#, &options).await?;

	assert_eq!(html, r#"<style>.x-test {}</style><i class="x-test"></i>"#);

	Ok(())
}

#[tokio::test]
async fn unterminated_comment_fails_the_document() {
	let tmp = tempdir();
	let result = run(
		r#"<style module>.a { color: red } /* oops .b { color: blue }</style><div classname="a b"></div>"#,
		&test_options(tmp.path()),
	)
	.await;

	let Err(error) = result else {
		panic!("expected an unterminated comment to fail");
	};
	assert_eq!(error_code(&error), "modstyle::css_syntax");
}

#[tokio::test]
async fn composes_local_classes_in_order() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.c {width: 50px;} .b {height: 100px;} .a {color: black; composes: b c;}</style><div classname="a"></div>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.c-test {width: 50px;} .b-test {height: 100px;} .a-test {color: black;}</style><div class="a-test b-test c-test"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn composes_from_another_file_without_copying_its_css() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "compose.spec.css", COMPOSE_SPEC_CSS);
	let options = test_options(tmp.path()).with_from(tmp.path().join("index.spec.js"));

	let html = run(
		r#"<style module>.compose {color: black; composes: compositor from "./compose.spec.css"}</style><div classname="compose"></div>"#,
		&options,
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.compose-test {color: black}</style><div class="compose-test compositor-test"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn generates_default_names_from_the_relative_path() -> ModstyleResult<()> {
	let tmp = tempdir();
	let options = TransformOptions::new(tmp.path()).with_from("test/index.spec.js");

	let html = run(
		r#"<style module>.root {color: red;}</style><div classname="root"></div>"#,
		&options,
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>._test_index_spec__root {color: red;}</style><div class="_test_index_spec__root"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn includes_linked_stylesheet() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "test/test.spec.css", TEST_SPEC_CSS);
	let options = TransformOptions::new(tmp.path()).with_naming(NamingStrategy::template("[local]")?);

	let html = run(
		r#"<div><link href="./test/test.spec.css" module/></div>"#,
		&options,
	)
	.await?;

	assert_eq!(html, format!("<div><style>{TEST_SPEC_CSS}</style></div>"));

	Ok(())
}

#[tokio::test]
async fn keeps_previous_classes_first() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "test/test.spec.css", TEST_SPEC_CSS);
	let options = TransformOptions::new(tmp.path()).with_naming(NamingStrategy::template("[local]")?);

	let html = run(
		r#"<link href="./test/test.spec.css" module/><div classname="root" class="div-class"></div>"#,
		&options,
	)
	.await?;

	assert_eq!(
		html,
		format!(r#"<style>{TEST_SPEC_CSS}</style><div class="div-class root"></div>"#)
	);

	Ok(())
}

#[tokio::test]
async fn fails_when_linked_file_is_missing() {
	let tmp = tempdir();
	let result = run(
		r#"<div><link href="./undefined.css" module/></div>"#,
		&TransformOptions::new(tmp.path()),
	)
	.await;

	let Err(ModstyleError::Read { path, .. }) = result else {
		panic!("expected a read error, got {result:?}");
	};
	assert!(path.ends_with("undefined.css"), "unexpected path: {path}");
}

#[tokio::test]
async fn one_failing_node_fails_the_whole_document() {
	let tmp = tempdir();
	let result = run(
		r#"<style module>.a {}</style><link href="missing.css" module><div classname="a"></div>"#,
		&test_options(tmp.path()),
	)
	.await;

	assert!(matches!(result, Err(ModstyleError::Read { .. })));
}

#[tokio::test]
async fn document_without_style_nodes_is_untouched() -> ModstyleResult<()> {
	let tmp = tempdir();
	let source = r#"<div classname="a"><p>text</p></div>"#;
	let html = run(source, &test_options(tmp.path())).await?;
	assert_eq!(html, source);

	Ok(())
}

#[tokio::test]
async fn removes_class_name_attribute_everywhere() -> ModstyleResult<()> {
	let tmp = tempdir();
	let html = run(
		r#"<style module>.a {}</style><p classname="unknown"></p><p classname="a"></p>"#,
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(html, r#"<style>.a-test {}</style><p></p><p class="a-test"></p>"#);

	Ok(())
}

#[tokio::test]
async fn substitutes_in_place_when_class_is_the_source_attribute() -> ModstyleResult<()> {
	let tmp = tempdir();
	let selectors = SelectorConfig {
		class_name: "class".to_string(),
		..SelectorConfig::default()
	};
	let options = test_options(tmp.path()).with_selectors(selectors);

	let html = run(
		r#"<style module>.a {} .b {}</style><div class="a other b"></div>"#,
		&options,
	)
	.await?;

	assert_eq!(
		html,
		r#"<style>.a-test {} .b-test {}</style><div class="a-test other b-test"></div>"#
	);

	Ok(())
}

#[tokio::test]
async fn custom_selectors_pick_style_nodes() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "a.css", ".a {}");
	let selectors = SelectorConfig {
		link: "link[rel=modstyle][src]".to_string(),
		style: "style[scoped]".to_string(),
		class_name: "data-class".to_string(),
		marker: "scoped".to_string(),
		reference: "src".to_string(),
	};
	let options = test_options(tmp.path()).with_selectors(selectors);

	let html = run(
		r#"<link rel="modstyle" src="a.css"><style scoped>.b {}</style><i data-class="a b"></i>"#,
		&options,
	)
	.await?;

	assert_eq!(
		html,
		r#"<style rel="modstyle">.a-test {}</style><style>.b-test {}</style><i class="a-test b-test"></i>"#
	);

	Ok(())
}

#[tokio::test]
async fn identical_inputs_produce_identical_output() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(
		tmp.path(),
		"styles/button.css",
		".base {padding: 0} .button {composes: base; color: red}",
	);
	let options = TransformOptions::new(tmp.path())
		.with_from(tmp.path().join("index.html"))
		.with_naming(NamingStrategy::template("[name]__[local]___[hash:base64:5]")?);
	let source = r#"<link module href="styles/button.css"><a classname="button"></a>"#;

	let first = run(source, &options).await?;
	let second = run(source, &options).await?;
	assert_eq!(first, second);
	assert!(first.contains("button__button___"));

	Ok(())
}

#[tokio::test]
async fn linked_file_shared_by_nodes_is_named_once() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "a.css", ".a {}");
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let naming = NamingStrategy::custom(move |local, _| {
		counter.fetch_add(1, Ordering::SeqCst);
		format!("x-{local}")
	});
	let options = TransformOptions::new(tmp.path()).with_naming(naming);

	let html = run(
		r#"<link module href="a.css"><link module href="/a.css"><b classname="a"></b>"#,
		&options,
	)
	.await?;

	assert_eq!(html, r#"<style>.x-a {}</style><style>.x-a {}</style><b class="x-a"></b>"#);
	assert_eq!(calls.load(Ordering::SeqCst), 1);

	Ok(())
}

#[tokio::test]
async fn custom_generator_with_whitespace_is_rejected() {
	let tmp = tempdir();
	let options = TransformOptions::new(tmp.path())
		.with_naming(NamingStrategy::custom(|local, _| format!("{local} bad")));

	let result = run(r#"<style module>.a {}</style>"#, &options).await;
	assert!(matches!(
		result,
		Err(ModstyleError::InvalidScopedName { ref local, .. }) if local == "a"
	));
}

#[tokio::test]
#[traced_test]
async fn logs_document_completion() -> ModstyleResult<()> {
	let tmp = tempdir();
	run(r#"<style module>.a {}</style>"#, &test_options(tmp.path())).await?;
	assert!(logs_contain("transformed document"));

	Ok(())
}

// --- Pipeline stages ---

#[tokio::test]
async fn detects_circular_composition_across_files() {
	let tmp = tempdir();
	write(tmp.path(), "a.css", r#".a { composes: b from "./b.css"; }"#);
	write(tmp.path(), "b.css", r#".b { composes: a from "./a.css"; }"#);

	let result = run(
		r#"<link module href="a.css">"#,
		&test_options(tmp.path()),
	)
	.await;

	let Err(ModstyleError::CircularComposition { chain }) = result else {
		panic!("expected a circular composition error, got {result:?}");
	};
	assert_eq!(chain, "a.css -> b.css -> a.css");
}

#[tokio::test]
async fn shared_imports_are_not_cycles() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "base.css", ".base {}");
	write(tmp.path(), "left.css", r#".left { composes: base from "./base.css"; }"#);
	write(
		tmp.path(),
		"main.css",
		r#".main { composes: left from "./left.css"; composes: base from "./base.css"; }"#,
	);

	let output = process_stylesheet(
		&std::fs::read_to_string(tmp.path().join("main.css"))?,
		tmp.path().join("main.css"),
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		output.tokens.get("main"),
		Some(["main-test".to_string(), "left-test".to_string(), "base-test".to_string()].as_slice())
	);

	Ok(())
}

fn error_code(error: &ModstyleError) -> String {
	miette::Diagnostic::code(error)
		.map(|code| code.to_string())
		.unwrap_or_default()
}

#[rstest]
#[case::unknown_local(".a { composes: missing; }", "modstyle::unknown_composition")]
#[case::local_cycle(
	".a { composes: b; } .b { composes: a; }",
	"modstyle::circular_local_composition"
)]
#[case::self_cycle(".a { composes: a; }", "modstyle::circular_local_composition")]
#[case::compound_selector(".a .b { composes: c; } .c {}", "modstyle::invalid_composition")]
#[case::id_selector("#a { composes: c; } .c {}", "modstyle::invalid_composition")]
#[tokio::test]
async fn composition_errors(#[case] css: &str, #[case] expected: &str) {
	let tmp = tempdir();
	let Err(error) = process_stylesheet(css, "", &test_options(tmp.path())).await else {
		panic!("expected `{css}` to fail");
	};

	assert_eq!(error_code(&error), expected);
}

#[tokio::test]
async fn unknown_imported_class_is_an_error() {
	let tmp = tempdir();
	write(tmp.path(), "b.css", ".b {}");

	let result = process_stylesheet(
		r#".a { composes: nope from "./b.css"; }"#,
		"",
		&test_options(tmp.path()),
	)
	.await;

	assert!(matches!(
		result,
		Err(ModstyleError::UnknownImport { ref name, ref path }) if name == "nope" && path == "./b.css"
	));
}

#[rstest]
#[case::chain(
	".c {} .b { composes: c; } .a { composes: b; }",
	"a",
	&["a-test", "b-test", "c-test"]
)]
#[case::duplicates_keep_first(
	".c {} .b { composes: c; } .a { composes: b c; }",
	"a",
	&["a-test", "b-test", "c-test"]
)]
#[case::global(".a { composes: util clearfix from global; }", "a", &["a-test", "util", "clearfix"])]
#[case::declared_later(".a { composes: b; } .b {}", "a", &["a-test", "b-test"])]
#[case::list_selector(".a, .b { composes: c; } .c {}", "b", &["b-test", "c-test"])]
#[case::compose_with_alias(".a { compose-with: b; } .b {}", "a", &["a-test", "b-test"])]
#[tokio::test]
async fn composition_expansion(
	#[case] css: &str,
	#[case] local: &str,
	#[case] expected: &[&str],
) -> ModstyleResult<()> {
	let tmp = tempdir();
	let output = process_stylesheet(css, "", &test_options(tmp.path())).await?;
	let expected: Vec<String> = expected.iter().map(ToString::to_string).collect();

	assert_eq!(output.tokens.get(local), Some(expected.as_slice()));
	assert!(!output.css.contains("compose"));

	Ok(())
}

#[tokio::test]
async fn substitutes_constants() -> ModstyleResult<()> {
	let tmp = tempdir();
	let css = "@value primary: red; @value small: (max-width: 599px); @value accent: primary; \
	           @media small { .a { color: accent; border-color: primary } }";

	let output = process_stylesheet(css, "", &test_options(tmp.path())).await?;

	assert_eq!(
		output.css,
		" @media (max-width: 599px) { .a-test { color: red; border-color: red } }"
	);
	assert_eq!(output.value("accent"), Some("red"));

	Ok(())
}

#[tokio::test]
async fn imports_constants_from_another_file() -> ModstyleResult<()> {
	let tmp = tempdir();
	write(tmp.path(), "colors.css", "@value brand: #f00; @value muted: #999;");

	let output = process_stylesheet(
		r#"@value brand, muted as grey from "./colors.css"; .a { color: brand; background: grey }"#,
		"",
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(output.css, " .a-test { color: #f00; background: #999 }");
	assert_eq!(output.value("grey"), Some("#999"));

	Ok(())
}

#[tokio::test]
async fn importing_an_undefined_constant_fails() {
	let tmp = tempdir();
	write(tmp.path(), "colors.css", "@value brand: #f00;");

	let result = process_stylesheet(
		r#"@value missing from "./colors.css";"#,
		"",
		&test_options(tmp.path()),
	)
	.await;

	assert!(matches!(
		result,
		Err(ModstyleError::UndefinedConstant { ref name, .. }) if name == "missing"
	));
}

#[tokio::test]
async fn constants_are_not_substituted_inside_strings() -> ModstyleResult<()> {
	let tmp = tempdir();
	let output = process_stylesheet(
		r#"@value x: 1px; .a { content: "x"; margin: x }"#,
		"",
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(output.css, r#" .a-test { content: "x"; margin: 1px }"#);

	Ok(())
}

#[tokio::test]
async fn scopes_keyframes_and_animation_references() -> ModstyleResult<()> {
	let tmp = tempdir();
	let output = process_stylesheet(
		"@keyframes fade { from { opacity: 0 } to { opacity: 1 } } .a { animation: fade 1s ease; }",
		"",
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		output.css,
		"@keyframes fade-test { from { opacity: 0 } to { opacity: 1 } } .a-test { animation: fade-test 1s ease; }"
	);
	assert_eq!(output.tokens.keys().collect::<Vec<_>>(), vec!["fade", "a"]);

	Ok(())
}

#[tokio::test]
async fn global_escapes_are_left_alone() -> ModstyleResult<()> {
	let tmp = tempdir();
	let output = process_stylesheet(
		"@keyframes :global(spin) {} :global(.foo) .a { animation-name: spin } :global .bar .baz {} #main {}",
		"",
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(
		output.css,
		"@keyframes spin {} .foo .a-test { animation-name: spin } .bar .baz {} #main-test {}"
	);
	assert_eq!(output.tokens.keys().collect::<Vec<_>>(), vec!["a", "main"]);

	Ok(())
}

#[tokio::test]
async fn strip_comments_pass_runs_last() -> ModstyleResult<()> {
	let tmp = tempdir();
	let options = test_options(tmp.path()).with_pass(StripComments);
	let output = process_stylesheet("/* x */ .a { /* y */ color: red }", "", &options).await?;

	assert_eq!(output.css, " .a-test { color: red }");

	Ok(())
}

struct TokenBanner;

impl Pass for TokenBanner {
	fn name(&self) -> &str {
		"token-banner"
	}

	fn run(&self, sheet: &mut Stylesheet, tokens: &TokenMap) -> ModstyleResult<()> {
		let names = tokens.keys().collect::<Vec<_>>().join(",");
		sheet.root.nodes.push(CssNode::Comment(Comment {
			before: "\n".to_string(),
			text: format!("/* {names} */"),
		}));
		Ok(())
	}
}

#[tokio::test]
async fn extension_passes_see_the_final_tokens() -> ModstyleResult<()> {
	let tmp = tempdir();
	let options = test_options(tmp.path()).with_pass(TokenBanner);
	let output = process_stylesheet(".a {} .b {}", "", &options).await?;

	assert_eq!(output.css, ".a-test {} .b-test {}\n/* a,b */");

	Ok(())
}

#[tokio::test]
async fn token_map_serializes_as_ordered_object() -> ModstyleResult<()> {
	let tmp = tempdir();
	let output = process_stylesheet(
		".z {} .a { composes: z; }",
		"",
		&test_options(tmp.path()),
	)
	.await?;

	assert_eq!(output.tokens.class_string("a"), Some("a-test z-test".to_string()));

	let json = serde_json::to_string_pretty(&output.tokens).unwrap_or_else(|e| panic!("json: {e}"));
	insta::assert_snapshot!(json, @r#"
	{
	  "z": "z-test",
	  "a": "a-test z-test"
	}
	"#);

	Ok(())
}

// --- Stylesheet tree ---

#[rstest]
#[case::everything(STYLESHEET_WITH_EVERYTHING)]
#[case::empty("")]
#[case::whitespace_only("  \n")]
#[case::trailing_semicolon(".a { color: red; }")]
#[case::no_trailing_semicolon(".a{color:red}")]
#[case::stray_semicolon(".a { ; color: red;; }")]
#[case::nested_rules(".a { color: red; & .b { color: blue } }")]
fn stylesheet_prints_untouched_input_verbatim(#[case] source: &str) -> ModstyleResult<()> {
	let sheet = Stylesheet::parse(source, "test.css")?;
	assert_eq!(sheet.to_css(), source);

	Ok(())
}

#[rstest]
#[case::unclosed_block(".a { color: red")]
#[case::unexpected_close(".a {} }")]
#[case::unterminated_string(".a { content: \"abc }")]
#[case::unterminated_comment(".a {} /* open")]
#[case::unterminated_comment_star(".a {} /* open **")]
fn stylesheet_syntax_errors(#[case] source: &str) {
	let result = Stylesheet::parse(source, "broken.css");
	assert!(matches!(result, Err(ModstyleError::CssSyntax { ref origin, .. }) if origin == "broken.css"));
}

#[test]
fn stylesheet_declarations_are_split() -> ModstyleResult<()> {
	let sheet = Stylesheet::parse(".a { Color : red ; }", "")?;
	let CssNode::Rule(rule) = &sheet.root.nodes[0] else {
		panic!("expected a rule");
	};
	let CssNode::Declaration(decl) = &rule.block.nodes[0] else {
		panic!("expected a declaration");
	};

	assert_eq!(decl.prop, "Color");
	assert_eq!(decl.property(), "color");
	assert_eq!(decl.between, " : ");
	assert_eq!(decl.value, "red");
	assert_eq!(decl.after, " ");

	Ok(())
}

// --- Selectors ---

#[rstest]
#[case::single(".a", ".a-x")]
#[case::compound(".a.b:hover > #c", ".a-x.b-x:hover > #c-x")]
#[case::global_function(":global(.a) .b", ".a .b-x")]
#[case::global_bare(":global .a .b", ".a .b")]
#[case::comma_resets(":global .a, .b", ".a, .b-x")]
#[case::local_function(":global .a :local(.b)", ".a .b-x")]
#[case::not_pseudo(".a:not(.b)", ".a-x:not(.b-x)")]
#[case::attribute(".a[data-x=\".y\"]", ".a-x[data-x=\".y\"]")]
#[case::element("div > p", "div > p")]
#[case::escaped(".a\\:b", ".a\\:b-x")]
#[case::escaped_dot(".a\\.b > .c", ".a\\.b-x > .c-x")]
fn local_selector_rendering(#[case] selector: &str, #[case] expected: &str) -> ModstyleResult<()> {
	let local = LocalSelector::parse(selector)?;
	assert_eq!(local.render(|_, name| format!("{name}-x")), expected);

	Ok(())
}

#[rstest]
#[case::plain("plain", "plain")]
#[case::colon("sm\\:flex", "sm:flex")]
#[case::dot("a\\.b", "a.b")]
#[case::hex_with_space("\\31 0", "10")]
#[case::hex_unicode("\\E9 t\\E9", "\u{e9}t\u{e9}")]
fn identifiers_are_unescaped(#[case] escaped: &str, #[case] expected: &str) {
	assert_eq!(unescape_identifier(escaped), expected);
}

#[rstest]
#[case::plain("a-b_c", "a-b_c")]
#[case::colon("sm:flex", "sm\\:flex")]
#[case::leading_digit("10", "\\31 0")]
#[case::non_ascii("\u{e9}t\u{e9}", "\u{e9}t\u{e9}")]
fn identifiers_are_serialized(#[case] name: &str, #[case] expected: &str) {
	assert_eq!(serialize_identifier(name), expected);
}

#[rstest]
#[case::one(".a", Some(vec!["a"]))]
#[case::list(".a, .b", Some(vec!["a", "b"]))]
#[case::descendant(".a .b", None)]
#[case::pseudo(".a:hover", None)]
#[case::id("#a", None)]
#[case::global(":global(.a)", None)]
fn single_class_selectors(#[case] selector: &str, #[case] expected: Option<Vec<&str>>) -> ModstyleResult<()> {
	let local = LocalSelector::parse(selector)?;
	assert_eq!(local.single_classes(), expected);

	Ok(())
}

#[test]
fn unbalanced_selector_is_an_error() {
	assert!(LocalSelector::parse(":global(.a").is_err());
	assert!(LocalSelector::parse(".a)").is_err());
}

#[rstest]
#[case("fade", ("fade", true))]
#[case(":global(spin)", ("spin", false))]
#[case(":local(pulse)", ("pulse", true))]
fn keyframes_names(#[case] params: &str, #[case] expected: (&str, bool)) {
	assert_eq!(keyframes_name(params), (expected.0.to_string(), expected.1));
}

// --- Naming ---

#[rstest]
#[case::spec_file("root", "test/index.spec.js", "_test_index_spec__root")]
#[case::no_extension("a", "styles/button", "_styles_button__a")]
#[case::dotted_dir("a", "my.dir/x.css", "_my_dir_x__a")]
#[case::inline("a", "", "___a")]
fn default_names(#[case] local: &str, #[case] relative: &str, #[case] expected: &str) {
	assert_eq!(default_scoped_name(local, relative), expected);
}

#[rstest]
#[case::local_suffix("[local]-test", "primary-test")]
#[case::name_and_local("[name]__[local]", "button__primary")]
#[case::path("[path][name]", "src-components-button")]
#[case::folder("[folder]-[local]", "components-primary")]
#[case::extension("[name][ext]", "button-css")]
#[case::unknown_placeholder("[emoji]-[local]", "-emoji--primary")]
fn naming_templates(#[case] template: &str, #[case] expected: &str) -> ModstyleResult<()> {
	let template = NameTemplate::parse(template)?;
	let name = template.render(
		"primary",
		Path::new("/project/src/components/button.css"),
		Path::new("/project"),
	);
	assert_eq!(name, expected);

	Ok(())
}

#[rstest]
#[case::hex("x[hash:hex:8]", 8)]
#[case::base64("x[hash:base64:5]", 5)]
#[case::short("x[hash:6]", 6)]
#[case::full("x[hash]", 16)]
fn hash_placeholders_truncate(#[case] template: &str, #[case] length: usize) -> ModstyleResult<()> {
	let template = NameTemplate::parse(template)?;
	let first = template.render("a", Path::new("/p/a.css"), Path::new("/p"));
	let again = template.render("a", Path::new("/p/a.css"), Path::new("/p"));
	let other = template.render("b", Path::new("/p/a.css"), Path::new("/p"));

	assert_eq!(first, again);
	assert_ne!(first, other);
	assert_eq!(first.len(), length + 1, "unexpected length for `{first}`");

	Ok(())
}

#[rstest]
#[case::unknown_encoding("[hash:sha1:5]")]
#[case::bad_length("[hash:abc]")]
#[case::too_many_fields("[hash:hex:5:1]")]
fn invalid_templates(#[case] template: &str) {
	assert!(matches!(
		NameTemplate::parse(template),
		Err(ModstyleError::InvalidTemplate { .. })
	));
}

#[rstest]
#[case("plain", "plain")]
#[case("a.b/c", "a-b-c")]
#[case("1abc", "_1abc")]
#[case("--x", "_--x")]
#[case("-1", "_-1")]
#[case("-x", "-x")]
#[case("héllo", "h-llo")]
fn identifier_escaping(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(escape_identifier(input), expected);
}

// --- Resolution ---

#[rstest]
#[case::absolute("/styles/a.css", "/site/pages/index.html", "/site/styles/a.css")]
#[case::relative("./a.css", "/site/pages/index.html", "/site/pages/a.css")]
#[case::parent("../a.css", "/site/pages/index.html", "/site/a.css")]
#[case::bare("a.css", "/site/pages/index.html", "/site/pages/a.css")]
#[case::quoted("\"./a.css\"", "/site/pages/index.html", "/site/pages/a.css")]
#[case::no_document("./a.css", "", "/site/a.css")]
#[case::relative_document("a.css", "pages/index.html", "/site/pages/a.css")]
fn reference_resolution(#[case] reference: &str, #[case] from: &str, #[case] expected: &str) {
	let resolved = resolve_reference(reference, Path::new("/site"), Path::new(from));
	assert_eq!(resolved, PathBuf::from(expected));
}

#[rstest]
#[case("/a/./b/../c", "/a/c")]
#[case("a/../../b", "../b")]
fn lexical_normalization(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(normalize(Path::new(input)), PathBuf::from(expected));
}

#[rstest]
#[case("/site/a/b.css", "a/b.css")]
#[case("/other/b.css", "../other/b.css")]
#[case("", "")]
fn relative_paths(#[case] path: &str, #[case] expected: &str) {
	assert_eq!(relative_path(Path::new("/site"), Path::new(path)), expected);
}

// --- Markup ---

#[rstest]
#[case::full_page(
	"<!DOCTYPE html><html><head><title>x < y</title></head><body><p>Hi &amp; bye</p><br><img src=\"a.png\"/></body></html>"
)]
#[case::comments("<!-- note --><div>a</div>")]
#[case::script("<script>if (a < b && c > d) {}</script>")]
#[case::unclosed("<div><p>open")]
#[case::stray_end("text</span>more")]
#[case::bare_less_than("<p>1 < 2 and 3 > 2</p>")]
#[case::digit_after_less_than("<p>a<1</p>")]
#[case::escaped_attribute(r#"<a href="a&amp;b" title='say "hi"'>x</a>"#)]
fn markup_round_trips(#[case] source: &str) -> ModstyleResult<()> {
	let document = Document::parse(source)?;
	assert_eq!(document.render(), source);

	Ok(())
}

#[test]
fn markup_elements_can_be_edited_in_place() -> ModstyleResult<()> {
	let mut document = Document::parse(r#"<div id="x" hidden><span>a</span></div>"#)?;
	let selector = MatchSelector::parse("span, div[hidden]")?;
	let ids = document.select(&selector);
	assert_eq!(ids.len(), 2);

	let div = document
		.element_mut(&ids[0])
		.unwrap_or_else(|| panic!("missing div"));
	div.remove_attr("hidden");
	div.set_attr("class", "y");
	assert_eq!(div.attr("ID"), Some("x"));

	assert_eq!(document.render(), r#"<div id="x" class="y"><span>a</span></div>"#);

	Ok(())
}

#[test]
fn markup_attributes_are_decoded_for_lookups() -> ModstyleResult<()> {
	let mut document = Document::parse(r#"<a href="a&amp;b&#46;css" data-x="&nbsp;">x</a>"#)?;
	let Some(Node::Element(element)) = document.nodes.first_mut() else {
		panic!("expected an element");
	};
	assert_eq!(element.attr("href"), Some("a&b.css"));
	assert_eq!(element.attr("data-x"), Some("&nbsp;"));

	element.set_attr("title", "1 < 2 & \"3\"");
	assert_eq!(
		document.render(),
		r#"<a href="a&amp;b&#46;css" data-x="&nbsp;" title="1 &lt; 2 &amp; &quot;3&quot;">x</a>"#
	);

	Ok(())
}

#[rstest]
#[case::tag_and_attribute("link[module][href]", r#"<link module href="a.css">"#, true)]
#[case::missing_attribute("link[module][href]", "<link module>", false)]
#[case::other_tag("link[module]", "<style module></style>", false)]
#[case::list("link[module], style[module]", "<style module></style>", true)]
#[case::equals("link[rel=stylesheet]", r#"<link rel="stylesheet">"#, true)]
#[case::quoted_equals("link[rel='stylesheet']", r#"<link rel="stylesheet">"#, true)]
#[case::includes("[class~=b]", r#"<p class="a b c"></p>"#, true)]
#[case::case_insensitive_tag("LINK", "<link>", true)]
fn match_selectors(#[case] selector: &str, #[case] markup: &str, #[case] expected: bool) -> ModstyleResult<()> {
	let selector = MatchSelector::parse(selector)?;
	let document = Document::parse(markup)?;
	let Some(Node::Element(element)) = document.nodes.first() else {
		panic!("expected an element");
	};
	assert_eq!(selector.matches(element), expected);

	Ok(())
}

#[rstest]
#[case::descendant("div span")]
#[case::empty_entry("link,")]
#[case::unclosed("link[module")]
#[case::nameless("link[=a]")]
fn invalid_match_selectors(#[case] selector: &str) {
	assert!(matches!(
		MatchSelector::parse(selector),
		Err(ModstyleError::InvalidSelector { .. })
	));
}

#[test]
fn element_text_joins_text_children() {
	let element = Element {
		children: vec![Node::Text("a".to_string()), Node::Text("b".to_string())],
		..Element::new("style")
	};
	assert_eq!(element.text(), "ab");
}

// --- Configuration ---

#[test]
fn parses_full_config() -> ModstyleResult<()> {
	let config = ModstyleConfig::parse(
		r#"
generate_scoped_name = "[name]__[local]"
plugins = ["strip-comments"]

[selectors]
class_name = "data-class"

[build]
include = ["site/**/*.html"]
exclude = ["dist/"]
out_dir = "public"
disable_gitignore = true
"#,
	)?;

	assert!(matches!(config.generate_scoped_name, Some(NamingStrategy::Template(_))));
	assert_eq!(config.plugins, vec!["strip-comments"]);
	assert_eq!(config.selectors.class_name, "data-class");
	assert_eq!(config.selectors.link, DEFAULT_LINK_SELECTOR);
	assert_eq!(config.build.out_dir, Some(PathBuf::from("public")));
	assert!(config.build.disable_gitignore);

	let options = TransformOptions::from_config("/site", Some(&config))?;
	assert_eq!(options.passes.len(), 1);
	assert_eq!(options.passes[0].name(), "strip-comments");

	Ok(())
}

#[rstest]
#[case::bad_toml("plugins = [")]
#[case::bad_template(r#"generate_scoped_name = "[hash:nope:1]""#)]
fn config_parse_errors(#[case] content: &str) {
	assert!(matches!(
		ModstyleConfig::parse(content),
		Err(ModstyleError::ConfigParse(_))
	));
}

#[test]
fn unknown_plugin_is_rejected() -> ModstyleResult<()> {
	let config = ModstyleConfig::parse(r#"plugins = ["minify"]"#)?;
	let result = TransformOptions::from_config("/site", Some(&config));
	assert!(matches!(result, Err(ModstyleError::UnknownPlugin(ref name)) if name == "minify"));

	Ok(())
}

#[test]
fn invalid_configured_selector_is_rejected() -> ModstyleResult<()> {
	let config = ModstyleConfig::parse("[selectors]\nlink = \"link[\"")?;
	let result = TransformOptions::from_config("/site", Some(&config));
	assert!(matches!(result, Err(ModstyleError::InvalidSelector { .. })));

	Ok(())
}

#[test]
fn loads_config_from_candidate_locations() -> ModstyleResult<()> {
	let tmp = tempdir();
	assert!(ModstyleConfig::load(tmp.path())?.is_none());

	write(tmp.path(), ".config/modstyle.toml", "plugins = []");
	assert_eq!(
		ModstyleConfig::resolve_path(tmp.path()),
		Some(tmp.path().join(".config/modstyle.toml"))
	);

	write(tmp.path(), "modstyle.toml", "[build]\nout_dir = \"out\"");
	let config = ModstyleConfig::load(tmp.path())?.unwrap_or_else(|| panic!("missing config"));
	assert_eq!(config.build.out_dir, Some(PathBuf::from("out")));

	Ok(())
}

// --- Project scanning ---

#[test]
fn collects_documents_in_sorted_order() -> ModstyleResult<()> {
	let tmp = tempdir();
	let root = tmp.path();
	write(root, "index.html", "");
	write(root, "pages/about.htm", "");
	write(root, "styles/a.css", "");
	write(root, "node_modules/pkg/readme.html", "");
	write(root, "dist/index.html", "");
	write(root, "ignored/page.html", "");
	write(root, ".gitignore", "ignored/\n");

	let build = BuildConfig {
		exclude: vec!["dist/".to_string()],
		..BuildConfig::default()
	};
	let files = collect_documents(root, &ScanOptions::from_build_config(&build)?)?;

	assert_eq!(files, vec![root.join("index.html"), root.join("pages/about.htm")]);

	Ok(())
}

#[test]
fn include_patterns_replace_the_defaults() -> ModstyleResult<()> {
	let tmp = tempdir();
	let root = tmp.path();
	write(root, "index.html", "");
	write(root, "site/page.xhtml", "");

	let build = BuildConfig {
		include: vec!["site/*.xhtml".to_string()],
		disable_gitignore: true,
		..BuildConfig::default()
	};
	let files = collect_documents(root, &ScanOptions::from_build_config(&build)?)?;

	assert_eq!(files, vec![root.join("site/page.xhtml")]);

	Ok(())
}

#[test]
fn skipped_directories_are_not_scanned() -> ModstyleResult<()> {
	let tmp = tempdir();
	let root = tmp.path();
	write(root, "index.html", "");
	write(root, "out/index.html", "");

	let options = ScanOptions::default().skip_dir(root.join("out"));
	let files = collect_documents(root, &options)?;

	assert_eq!(files, vec![root.join("index.html")]);

	Ok(())
}
