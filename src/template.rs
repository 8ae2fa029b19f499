//! Clash-family templates see `proxies` and `proxy_remarks`, plus the
//! `yaml` and `indent(width)` filters.

use minijinja::{Environment, Error as JinjaError, ErrorKind, Value};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::error::TemplateError;

const CLASH_TEMPLATE: &str = include_str!("../templates/clash.yaml");
const STASH_TEMPLATE: &str = include_str!("../templates/stash.yaml");
const CLASH_META_TEMPLATE: &str = include_str!("../templates/clash_meta.yaml");
const SINGBOX_TEMPLATE: &str = include_str!("../templates/singbox.json");

#[derive(Debug, Clone)]
pub struct TemplateSet {
  pub clash: String,
  pub stash: String,
  pub clash_meta: String,
  pub singbox: String,
}

impl Default for TemplateSet {
  fn default() -> Self {
    Self {
      clash: CLASH_TEMPLATE.to_string(),
      stash: STASH_TEMPLATE.to_string(),
      clash_meta: CLASH_META_TEMPLATE.to_string(),
      singbox: SINGBOX_TEMPLATE.to_string(),
    }
  }
}

impl TemplateSet {
  /// Embedded defaults, with any file present in `dir` taking precedence.
  pub fn load(dir: Option<&Path>) -> Result<Self, TemplateError> {
    let mut set = Self::default();
    let Some(dir) = dir else {
      return Ok(set);
    };
    for (name, slot) in [
      ("clash.yaml", &mut set.clash),
      ("stash.yaml", &mut set.stash),
      ("clash_meta.yaml", &mut set.clash_meta),
      ("singbox.json", &mut set.singbox),
    ] {
      let path = dir.join(name);
      if !path.is_file() {
        continue;
      }
      *slot = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
        path: path.clone(),
        source,
      })?;
      debug!(path = %path.display(), "template override loaded");
    }
    Ok(set)
  }
}

pub trait TemplateRenderer {
  fn render<S: Serialize>(&self, template: &str, vars: &S) -> Result<String, TemplateError>;
}

pub struct MiniJinjaRenderer {
  env: Environment<'static>,
}

impl Default for MiniJinjaRenderer {
  fn default() -> Self {
    Self::new()
  }
}

impl MiniJinjaRenderer {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.add_filter("yaml", yaml_filter);
    env.add_filter("indent", indent_filter);
    Self { env }
  }
}

impl TemplateRenderer for MiniJinjaRenderer {
  fn render<S: Serialize>(&self, template: &str, vars: &S) -> Result<String, TemplateError> {
    Ok(self.env.render_str(template, vars)?)
  }
}

fn yaml_filter(value: Value) -> Result<String, JinjaError> {
  serde_yaml::to_string(&value)
    .map_err(|e| JinjaError::new(ErrorKind::InvalidOperation, format!("yaml filter: {e}")))
}

fn indent_filter(value: String, width: usize) -> String {
  indent(&value, width)
}

pub fn indent(text: &str, width: usize) -> String {
  let pad = " ".repeat(width);
  text
    .lines()
    .map(|line| format!("{pad}{line}"))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_indent_prefixes_every_line() {
    assert_eq!(indent("a\nb\n", 2), "  a\n  b");
    assert_eq!(indent("", 4), "");
  }

  #[test]
  fn test_yaml_and_indent_filters() {
    let r = MiniJinjaRenderer::new();
    let out = r
      .render(
        "list:\n{{ items | yaml | indent(2) }}\n",
        &json!({ "items": ["A", "B"] }),
      )
      .unwrap();
    assert_eq!(out, "list:\n  - A\n  - B");
  }

  #[test]
  fn test_nested_object_dump() {
    let r = MiniJinjaRenderer::new();
    let out = r
      .render(
        "{{ proxies | yaml }}",
        &json!({ "proxies": [ { "name": "n1", "port": 443 } ] }),
      )
      .unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    assert_eq!(parsed[0]["name"].as_str(), Some("n1"));
    assert_eq!(parsed[0]["port"].as_u64(), Some(443));
  }

  #[test]
  fn test_bad_template_is_error() {
    let r = MiniJinjaRenderer::new();
    assert!(r.render("{{ unclosed", &json!({})).is_err());
  }

  #[test]
  fn test_default_templates_present() {
    let set = TemplateSet::load(None).unwrap();
    assert!(set.clash.contains("proxies"));
    assert!(set.clash_meta.contains("proxy_remarks"));
    let sb: serde_json::Value = serde_json::from_str(&set.singbox).unwrap();
    assert!(sb["outbounds"].is_array());
  }
}
