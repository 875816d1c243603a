//! Template renderer for tfscaffold.
//! Substitutes `{{name}}` placeholders with resolved variables. Templates are flat
//! text with named holes: there is no control flow and substituted values are never
//! scanned again, so rendering always terminates.
use crate::error::{Error, Result};
use crate::variables::ResolvedVariableSet;
use regex::Regex;

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template body with the given variables.
    ///
    /// # Arguments
    /// * `artifact` - Name of the artifact being rendered, used in errors
    /// * `template` - Template body to render
    /// * `variables` - Resolved variables of the unit
    ///
    /// # Returns
    /// * `Result<String>` - Rendered artifact text
    fn render(
        &self,
        artifact: &str,
        template: &str,
        variables: &ResolvedVariableSet,
    ) -> Result<String>;
}

/// Literal `{{name}}` substitution engine.
pub struct PlaceholderRenderer {
    placeholder: Regex,
    stray_delimiter: Regex,
}

impl PlaceholderRenderer {
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap(),
            stray_delimiter: Regex::new(r"\{\{|\}\}").unwrap(),
        }
    }

    /// Names referenced by `template`, in order of first appearance.
    pub fn placeholders(&self, template: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in self.placeholder.captures_iter(template) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Rejects templates where engine delimiters and pass-through text overlap.
    fn check_delimiters(&self, artifact: &str, template: &str) -> Result<()> {
        let mut spans = Vec::new();
        for m in self.placeholder.find_iter(template) {
            if template[..m.start()].ends_with('$') {
                return Err(Error::AmbiguousPlaceholder {
                    artifact: artifact.to_string(),
                    fragment: format!("${}", m.as_str()),
                });
            }
            spans.push(m.range());
        }

        for m in self.stray_delimiter.find_iter(template) {
            let inside = spans
                .iter()
                .any(|span| span.start <= m.start() && m.end() <= span.end);
            if !inside {
                let line_start = template[..m.start()].rfind('\n').map_or(0, |i| i + 1);
                let line_end = template[m.end()..]
                    .find('\n')
                    .map_or(template.len(), |i| m.end() + i);
                return Err(Error::AmbiguousPlaceholder {
                    artifact: artifact.to_string(),
                    fragment: template[line_start..line_end].trim().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for PlaceholderRenderer {
    fn default() -> Self {
        PlaceholderRenderer::new()
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    /// # Errors
    /// * `Error::AmbiguousPlaceholder` for stray `{{`/`}}` or a `${{name}}` collision
    /// * `Error::UnresolvedVariable` for the first placeholder with no value
    fn render(
        &self,
        artifact: &str,
        template: &str,
        variables: &ResolvedVariableSet,
    ) -> Result<String> {
        self.check_delimiters(artifact, template)?;

        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;
        for caps in self.placeholder.captures_iter(template) {
            let whole = caps.get(0).unwrap();
            let name = &caps[1];
            let value = variables.text(name).ok_or_else(|| Error::UnresolvedVariable {
                key: name.to_string(),
                artifact: artifact.to_string(),
            })?;
            rendered.push_str(&template[last..whole.start()]);
            rendered.push_str(&value);
            last = whole.end();
        }
        rendered.push_str(&template[last..]);
        Ok(rendered)
    }
}
