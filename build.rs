//! Build script for minifying the embedded client scripts and document stylesheets.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::fs;
use std::path::Path;

const BRIDGE_PORT_PLACEHOLDER: &str = "__PREVIEW_WS_PORT__";

fn main() {
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    minify_bridge_js_file("src/embed/serve/bridge.js", &out_path.join("bridge.min.js"));
    minify_js_file(
        "src/embed/bundle/renderer.js",
        &out_path.join("renderer.min.js"),
    );
    minify_js_file("src/embed/bundle/preview.js", &out_path.join("preview.min.js"));
    minify_css_file(
        "src/embed/document/preview.css",
        &out_path.join("preview.min.css"),
    );
    minify_css_file(
        "src/embed/document/preloader.css",
        &out_path.join("preloader.min.css"),
    );

    println!("cargo:rerun-if-changed=src/embed/serve/bridge.js");
    println!("cargo:rerun-if-changed=src/embed/bundle/renderer.js");
    println!("cargo:rerun-if-changed=src/embed/bundle/preview.js");
    println!("cargo:rerun-if-changed=src/embed/document/preview.css");
    println!("cargo:rerun-if-changed=src/embed/document/preloader.css");
}

fn minify_js(source: &str) -> String {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();

    let ret = Parser::new(&allocator, source, source_type).parse();
    assert!(ret.errors.is_empty(), "Parse errors: {:?}", ret.errors);

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code
}

fn minify_js_file(input: &str, output: &Path) {
    let source = fs::read_to_string(input).expect("Failed to read JS file");
    fs::write(output, minify_js(&source)).expect("Failed to write minified JS");
}

fn minify_bridge_js_file(input: &str, output: &Path) {
    let source = fs::read_to_string(input).expect("Failed to read bridge.js");
    let code = minify_js(&source);

    assert_eq!(
        code.matches(BRIDGE_PORT_PLACEHOLDER).count(),
        1,
        "bridge.js must keep exactly one {} placeholder after minification",
        BRIDGE_PORT_PLACEHOLDER
    );

    fs::write(output, code).expect("Failed to write minified bridge JS");
}

fn minify_css(source: &str) -> String {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).expect("Failed to parse CSS");
    stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .expect("Failed to minify CSS")
        .code
}

fn minify_css_file(input: &str, output: &Path) {
    let source = fs::read_to_string(input).expect("Failed to read CSS file");
    fs::write(output, minify_css(&source)).expect("Failed to write minified CSS");
}
