//! Single-pass bundler.
//!
//! Every rebuild produces three artifacts:
//!
//! - `/components.js` - generated entry module registering each pattern
//!   implementation on `window.components[<bundle name>]`
//! - `/renderer.js`, `/preview.js` - embedded client bundles
//!
//! Pattern implementations are CommonJS modules. Each one is parsed with oxc
//! before it is wrapped; parse errors become the rebuild's diagnostics.
//! Relative `require` calls are followed and bundled as well; anything the
//! bundle cannot satisfy at runtime is a diagnostic here instead.

use std::collections::VecDeque;
use std::fmt::Write;
use std::fs;
use std::path::{Component, Path, PathBuf};

use oxc::allocator::Allocator;
use oxc::ast::ast::CallExpression;
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rustc_hash::FxHashSet;

use super::entry::{PatternEntry, request_path};
use super::event::{Diagnostic, Diagnostics};
use super::memfs::MemoryFs;
use super::minify::minify_script;
use super::pipeline::{BuildOutput, BuildRequest};
use crate::embed::BundleAsset;
use crate::embed::bundle::{PREVIEW, RENDERER};

/// Path of the generated entry module inside the output filesystem.
pub const COMPONENTS_PATH: &str = "/components.js";

/// Embedded bundles emitted next to the entry module.
const CLIENT_BUNDLES: [BundleAsset; 2] = [RENDERER, PREVIEW];

/// Extensions tried, in order, for an extensionless `require`.
const RESOLVE_EXTENSIONS: [&str; 3] = ["js", "cjs", "json"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Bundler {
    minify: bool,
}

impl Bundler {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    /// Run one rebuild.
    pub fn bundle(&self, request: &BuildRequest) -> BuildOutput {
        let mut diagnostics = Diagnostics::new();
        let modules = collect_modules(request, &mut diagnostics);

        let mut output = BuildOutput {
            fs: MemoryFs::new(),
            diagnostics,
        };
        if output.diagnostics.has_errors() {
            return output;
        }

        let mut components = generate_components(&request.entries, &modules);
        if self.minify {
            match minify_script(&components) {
                Some(minified) => components = minified,
                None => crate::debug!("bundle"; "components.js did not minify, emitting as is"),
            }
        }

        let mut emit = |path: &str, content: String| {
            if let Err(e) = output.fs.write(path, content) {
                output.diagnostics.push(Diagnostic::new(e.to_string()));
            }
        };
        emit(COMPONENTS_PATH, components);
        for asset in CLIENT_BUNDLES {
            emit(&asset.output_path(), asset.source.to_owned());
        }

        output
    }
}

/// One module of the bundle.
#[derive(Debug)]
struct Module {
    /// `./`-relative path from the build context, same form as entry requests
    id: String,
    source: String,
    /// `require` specifier → resolved module id
    requires: Vec<(String, String)>,
}

/// Load every entry and, breadth first, every module they require.
fn collect_modules(request: &BuildRequest, diagnostics: &mut Diagnostics) -> Vec<Module> {
    let mut modules = Vec::with_capacity(request.entries.len());
    let mut seen = FxHashSet::default();
    let mut pending: VecDeque<(String, PathBuf)> = request
        .entries
        .iter()
        .map(|entry| (entry.request.clone(), entry.source.clone()))
        .collect();

    while let Some((id, path)) = pending.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }

        let (source, specifiers) = match load_module(&id, &path) {
            Ok(loaded) => loaded,
            Err(errors) => {
                errors.into_iter().for_each(|d| diagnostics.push(d));
                continue;
            }
        };

        let dir = path.parent().unwrap_or(Path::new(""));
        let mut requires = Vec::with_capacity(specifiers.len());
        for specifier in specifiers {
            match resolve(dir, &specifier) {
                Ok(resolved) => {
                    let dep = request_path(&request.context, &resolved);
                    requires.push((specifier, dep.clone()));
                    pending.push_back((dep, resolved));
                }
                Err(message) => diagnostics.push(Diagnostic::in_file(&id, message)),
            }
        }

        modules.push(Module {
            id,
            source,
            requires,
        });
    }

    modules
}

/// Read and syntax-check one module; returns its source and `require`
/// specifiers in source order.
fn load_module(id: &str, path: &Path) -> Result<(String, Vec<String>), Vec<Diagnostic>> {
    let mut source = fs::read_to_string(path)
        .map_err(|e| vec![Diagnostic::in_file(id, format!("cannot read module: {e}"))])?;

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<serde_json::Value>(&source)
            .map_err(|e| vec![Diagnostic::in_file(id, format!("invalid JSON: {e}"))])?;
        source = format!("module.exports = {source};");
        return Ok((source, Vec::new()));
    }

    let specifiers = {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &source, SourceType::cjs()).parse();
        if !ret.errors.is_empty() {
            return Err(ret
                .errors
                .iter()
                .map(|e| Diagnostic::in_file(id, e.to_string()))
                .collect());
        }
        if ret.module_record.has_module_syntax {
            return Err(vec![Diagnostic::in_file(
                id,
                "ES module syntax is not supported, use `module.exports`",
            )]);
        }

        let mut collector = RequireCollector::default();
        collector.visit_program(&ret.program);
        if collector.dynamic > 0 {
            return Err(vec![Diagnostic::in_file(
                id,
                "`require` takes a single string literal",
            )]);
        }
        collector.specifiers
    };

    Ok((source, specifiers))
}

/// Collects `require("...")` specifiers; counts calls it cannot follow.
#[derive(Default)]
struct RequireCollector {
    specifiers: Vec<String>,
    dynamic: usize,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if it.callee.is_specific_id("require") {
            match it.common_js_require() {
                Some(literal) => self.specifiers.push(literal.value.as_str().to_owned()),
                None => self.dynamic += 1,
            }
        }
        walk::walk_call_expression(self, it);
    }
}

/// Resolve a relative specifier the way node does for files: exact path,
/// then with an extension, then as a directory index.
fn resolve(dir: &Path, specifier: &str) -> Result<PathBuf, String> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return Err(format!(
            "cannot resolve `{specifier}`: only relative requires are bundled"
        ));
    }

    let base = normalize(&dir.join(specifier));
    let with_extension = RESOLVE_EXTENSIONS.iter().map(|ext| {
        let mut path = base.clone().into_os_string();
        path.push(".");
        path.push(ext);
        PathBuf::from(path)
    });
    let as_index = RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| base.join(format!("index.{ext}")));

    std::iter::once(base.clone())
        .chain(with_extension)
        .chain(as_index)
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| format!("cannot resolve `{specifier}`"))
}

/// Lexical `.`/`..` folding; symlinks are left alone.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Generate the entry module.
///
/// Modules are evaluated lazily on first `require`, entries in entry order.
/// An entry that throws is logged in the browser console and leaves its slot
/// unset.
fn generate_components(entries: &[PatternEntry], modules: &[Module]) -> String {
    let mut out = String::from(
        "(function () {\n\
         \tvar components = window.components = window.components || {};\n\
         \tvar definitions = {\n",
    );

    for module in modules {
        let requires: serde_json::Map<String, serde_json::Value> = module
            .requires
            .iter()
            .map(|(specifier, id)| (specifier.clone(), serde_json::Value::from(id.as_str())))
            .collect();
        let _ = write!(
            out,
            "\t\t{}: [function (module, exports, require) {{\n{}\n\t\t}}, {}],\n",
            json_string(&module.id),
            module.source,
            serde_json::Value::Object(requires),
        );
    }

    out.push_str(
        "\t};\n\
         \tvar cache = {};\n\
         \tfunction load(id) {\n\
         \t\tif (cache[id]) return cache[id].exports;\n\
         \t\tvar definition = definitions[id];\n\
         \t\tvar module = cache[id] = { exports: {} };\n\
         \t\tfunction require(request) {\n\
         \t\t\tvar resolved = definition[1][request];\n\
         \t\t\tif (resolved === undefined) throw new Error(\"cannot find module \" + request + \" from \" + id);\n\
         \t\t\treturn load(resolved);\n\
         \t\t}\n\
         \t\ttry {\n\
         \t\t\tdefinition[0].call(module.exports, module, module.exports, require);\n\
         \t\t} catch (err) {\n\
         \t\t\tdelete cache[id];\n\
         \t\t\tthrow err;\n\
         \t\t}\n\
         \t\treturn module.exports;\n\
         \t}\n\
         \tvar entries = [\n",
    );

    for entry in entries {
        let _ = writeln!(
            out,
            "\t\t[{}, {}],",
            json_string(&entry.name),
            json_string(&entry.request)
        );
    }

    out.push_str(
        "\t];\n\
         \tentries.forEach(function (entry) {\n\
         \t\ttry {\n\
         \t\t\tcomponents[entry[0]] = load(entry[1]);\n\
         \t\t} catch (err) {\n\
         \t\t\tconsole.error(\"failed to load pattern \" + entry[1], err);\n\
         \t\t}\n\
         \t});\n\
         })();\n",
    );
    out
}

fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
