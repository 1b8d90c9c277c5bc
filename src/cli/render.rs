//! `render` command: print a preview document without starting a server.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use super::{RenderArgs, RenderMode};
use crate::document::{DocumentConfig, render, script_tag};
use crate::log;

/// Render the document selected by `args` to a file or stdout.
pub fn render_document(args: &RenderArgs) -> Result<()> {
    let html = build_document(args)?;

    match &args.output {
        Some(path) => {
            fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
            log!("render"; "wrote {}", path.display());
        }
        None => print!("{html}"),
    }
    Ok(())
}

fn build_document(args: &RenderArgs) -> Result<String> {
    let data = match &args.data {
        Some(path) => {
            let text = read(path)?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => Value::Null,
    };

    let content = read_optional(args.content.as_ref())?;
    if content.is_some() && args.mode != RenderMode::Static {
        log!("warning"; "--content is only used by static documents, ignoring");
    }

    let scripts = match read_optional(args.scripts.as_ref())? {
        Some(scripts) => scripts,
        None if args.mode == RenderMode::Static => String::new(),
        None => script_tag("components"),
    };

    let config = match args.mode {
        RenderMode::Static => DocumentConfig::Static {
            content: content.as_deref().unwrap_or_default(),
            data: &data,
            scripts: &scripts,
        },
        RenderMode::Live => DocumentConfig::Live {
            data: &data,
            scripts: &scripts,
        },
        RenderMode::LiveMirror => DocumentConfig::LiveMirror {
            data: &data,
            scripts: &scripts,
        },
    };
    Ok(render(&config))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_optional(path: Option<&PathBuf>) -> Result<Option<String>> {
    path.map(|p| read(p)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(mode: RenderMode) -> RenderArgs {
        RenderArgs {
            mode,
            data: None,
            content: None,
            scripts: None,
            output: None,
        }
    }

    #[test]
    fn test_static_document_from_files() {
        let temp = TempDir::new().unwrap();
        let content = temp.path().join("content.html");
        let scripts = temp.path().join("scripts.html");
        let data = temp.path().join("data.json");
        fs::write(&content, "<div>X</div>").unwrap();
        fs::write(&scripts, "<script data-script=\"components\">1</script>").unwrap();
        fs::write(&data, r#"{"pages": []}"#).unwrap();

        let html = build_document(&RenderArgs {
            content: Some(content),
            scripts: Some(scripts),
            data: Some(data),
            ..args(RenderMode::Static)
        })
        .unwrap();

        assert!(html.contains("<div id=\"preview\"><div>X</div></div>"));
        assert!(html.contains("<script data-script=\"components\">1</script>"));
        assert!(!html.contains("/scripts/renderer.js"));
    }

    #[test]
    fn test_live_document_loads_components() {
        let html = build_document(&args(RenderMode::Live)).unwrap();
        assert!(html.contains("/scripts/components.js"));
        assert!(html.contains("/scripts/renderer.js"));
    }

    #[test]
    fn test_invalid_data_is_error() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data.json");
        fs::write(&data, "{not json").unwrap();

        let err = build_document(&RenderArgs {
            data: Some(data),
            ..args(RenderMode::LiveMirror)
        })
        .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_output_file() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out/preview.html");
        fs::create_dir_all(output.parent().unwrap()).unwrap();

        render_document(&RenderArgs {
            output: Some(output.clone()),
            ..args(RenderMode::Live)
        })
        .unwrap();
        assert!(fs::read_to_string(output).unwrap().starts_with("<!doctype html>"));
    }
}
