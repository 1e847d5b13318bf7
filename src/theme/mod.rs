//! Theme engine
//!
//! This module provides template rendering using Tera.
//! Features:
//! - Templates embedded in the binary (from `templates/`)
//! - Optional on-disk override directory, whose files replace embedded
//!   templates of the same name
//! - Standard template variables injected into every page
//! - A plain HTML error page that needs no template

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory whose templates override the embedded ones
    override_path: Option<PathBuf>,
}

impl ThemeEngine {
    /// Create a theme engine from the embedded templates, optionally
    /// overlaid with the `.html` files found under `override_path`.
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: override_path.map(Path::to_path_buf),
        };
        engine.reload_templates()?;
        Ok(engine)
    }

    /// Rebuild the template set from the embedded files and the override directory
    fn reload_templates(&mut self) -> Result<()> {
        let mut templates = embedded_templates()?;

        if let Some(ref path) = self.override_path {
            if !path.is_dir() {
                return Err(ThemeError::NotFound(path.display().to_string()).into());
            }
            let mut overrides = Vec::new();
            collect_templates_from_dir(path, path, &mut overrides)?;
            tracing::info!("Loaded {} template override(s) from {:?}", overrides.len(), path);
            templates.extend(overrides);
        }

        let mut tera = Tera::default();
        // Added in one batch so `{% extends %}` resolves regardless of order
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(describe_tera_error(&e)))?;

        self.tera = tera;
        Ok(())
    }

    /// Render a template with context
    ///
    /// # Arguments
    /// * `template` - Template name (e.g., "index.html", "post.html")
    /// * `context` - Tera context with template variables
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!(
                "Failed to render '{}': {}",
                template,
                describe_tera_error(&e)
            ))
            .into()
        })
    }

    /// Render a template with standard variables automatically added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }
}

fn embedded_templates() -> Result<Vec<(String, String)>> {
    EmbeddedTemplates::iter()
        .map(|name| -> Result<(String, String)> {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::InvalidEncoding(name.to_string()))?;
            Ok((name.to_string(), content))
        })
        .collect()
}

/// Recursively collect `.html` files under `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let path = entry.map_err(ThemeError::IoError)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;

            // Forward slashes keep names identical across platforms
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn describe_tera_error(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Last-resort error page that does not depend on any template
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: Lora, Georgia, serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #212529; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>{message}</p>
    <p><a href="/">Back to all posts</a></p>
</body>
</html>"#,
        title = tera::escape_html(title),
        message = tera::escape_html(message),
    )
}

/// Variables every page template can rely on
#[derive(Debug, Clone, Default, Serialize)]
pub struct StandardTemplateVars {
    /// Blog name
    pub site_name: String,
    /// Logged-in user, if any
    pub current_user: Option<TemplateUser>,
    /// Whether the logged-in user is the administrator
    pub is_admin: bool,
    /// One-shot messages carried over from the previous request
    pub flash_messages: Vec<String>,
    /// Current request path
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
}

/// Logged-in user as exposed to templates
#[derive(Debug, Clone, Serialize)]
pub struct TemplateUser {
    pub id: i64,
    pub name: String,
}

impl StandardTemplateVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            current_user: None,
            is_admin: false,
            flash_messages: Vec::new(),
            request_path: request_path.into(),
            year: chrono::Local::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: TemplateUser, is_admin: bool) -> Self {
        self.current_user = Some(user);
        self.is_admin = is_admin;
        self
    }

    pub fn with_flash(mut self, messages: Vec<String>) -> Self {
        self.flash_messages = messages;
        self
    }

    fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
        context.insert("logged_in", &self.current_user.is_some());
        context.insert("current_user", &self.current_user);
        context.insert("is_admin", &self.is_admin);
        context.insert("flash_messages", &self.flash_messages);
    }
}
