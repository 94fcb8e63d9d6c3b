//! Case templates and prompt composition.
//!
//! A template is plain text with `{name}` placeholders. Each binding is
//! either a literal or the content of a named artifact. Artifact bindings
//! the template does not reference are rendered ahead of it as labelled
//! context blocks, so placeholder-free templates still see upstream output.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, instrument};

use sitesmith_artifacts::ArtifactStore;
use sitesmith_shared::{ArtifactKey, Result, SitesmithError};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// The template directory of one case (`<cases_dir>/<case>/`).
#[derive(Debug, Clone)]
pub struct TemplateSet {
    dir: PathBuf,
}

impl TemplateSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_case(cases_dir: &Path, case: &str) -> Self {
        Self::new(cases_dir.join(case))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a template by file name. A missing template is a config error.
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(SitesmithError::config(format!(
                "prompt template not found: {}",
                path.display()
            )));
        }
        std::fs::read_to_string(&path).map_err(|e| SitesmithError::io(&path, e))
    }
}

/// Case identifiers (sub-directory names) under `cases_dir`, sorted.
pub fn list_cases(cases_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(cases_dir).map_err(|e| SitesmithError::io(cases_dir, e))?;

    let mut cases = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SitesmithError::io(cases_dir, e))?;
        if entry.path().is_dir() {
            cases.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    cases.sort();
    Ok(cases)
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// What a placeholder resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingValue {
    Literal(String),
    Artifact(ArtifactKey),
}

/// A named placeholder binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: BindingValue,
}

impl Binding {
    /// Bind artifact `key` under its own logical name.
    pub fn artifact(key: ArtifactKey) -> Self {
        Self::artifact_as(key.as_str(), key)
    }

    /// Bind artifact `key` under a different placeholder name.
    pub fn artifact_as(name: impl Into<String>, key: ArtifactKey) -> Self {
        Self {
            name: name.into(),
            value: BindingValue::Artifact(key),
        }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: BindingValue::Literal(value.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// PromptComposer
// ---------------------------------------------------------------------------

/// Builds final prompt strings from templates and artifacts.
pub struct PromptComposer<'a> {
    templates: &'a TemplateSet,
    store: &'a ArtifactStore,
    max_artifact_lines: usize,
}

impl<'a> PromptComposer<'a> {
    pub fn new(templates: &'a TemplateSet, store: &'a ArtifactStore, max_artifact_lines: usize) -> Self {
        Self {
            templates,
            store,
            max_artifact_lines,
        }
    }

    /// Compose the prompt for `template_name`.
    ///
    /// Fails only when the template itself cannot be loaded or an artifact
    /// exists but cannot be read. A missing artifact renders as
    /// [`missing_marker`].
    #[instrument(skip_all, fields(template = template_name, bindings = bindings.len()))]
    pub fn compose(&self, template_name: &str, bindings: &[Binding]) -> Result<String> {
        let template = self.templates.load(template_name)?;

        let referenced: Vec<&str> = PLACEHOLDER_RE
            .captures_iter(&template)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        let mut resolved: Vec<(&Binding, String)> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            resolved.push((binding, self.resolve(&binding.value)?));
        }

        let mut preamble = String::new();
        for (binding, value) in &resolved {
            if let BindingValue::Artifact(key) = binding.value {
                if !referenced.contains(&binding.name.as_str()) {
                    preamble.push_str(&format!("{}:\n{value}\n\n", key.label()));
                }
            }
        }

        let body = render(&template, &resolved);
        debug!(
            prompt_len = preamble.len() + body.len(),
            "prompt composed"
        );

        Ok(preamble + &body)
    }

    fn resolve(&self, value: &BindingValue) -> Result<String> {
        match value {
            BindingValue::Literal(text) => Ok(text.clone()),
            BindingValue::Artifact(key) => Ok(match self.store.read(*key)? {
                Some(content) => truncate_lines(&content, self.max_artifact_lines),
                None => {
                    debug!(artifact = %key, "artifact not found, using marker");
                    missing_marker(*key)
                }
            }),
        }
    }
}

/// Substitute bound placeholders in a single pass; unbound ones stay verbatim.
fn render(template: &str, resolved: &[(&Binding, String)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            resolved
                .iter()
                .find(|(binding, _)| binding.name == name)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Placeholder text for an artifact that was never written.
pub fn missing_marker(key: ArtifactKey) -> String {
    format!("[artifact not found: {key}]")
}

/// Keep the first `max_lines` lines and note the true total. `0` disables.
pub fn truncate_lines(content: &str, max_lines: usize) -> String {
    let total = content.lines().count();
    if max_lines == 0 || total <= max_lines {
        return content.to_string();
    }

    let kept: String = content.split_inclusive('\n').take(max_lines).collect();
    format!("{kept}\n... (truncated, {total} lines total)")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        root: PathBuf,
        templates: TemplateSet,
        store: ArtifactStore,
    }

    impl Fixture {
        fn new(templates: &[(&str, &str)]) -> Self {
            let root = std::env::temp_dir().join(format!("sitesmith-prompt-{}", uuid::Uuid::now_v7()));
            let case_dir = root.join("cases").join("demo");
            std::fs::create_dir_all(&case_dir).unwrap();
            for (name, body) in templates {
                std::fs::write(case_dir.join(name), body).unwrap();
            }
            Self {
                templates: TemplateSet::for_case(&root.join("cases"), "demo"),
                store: ArtifactStore::new(root.join("outputs")),
                root,
            }
        }

        fn composer(&self, max_lines: usize) -> PromptComposer<'_> {
            PromptComposer::new(&self.templates, &self.store, max_lines)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn missing_artifact_renders_marker() {
        let fx = Fixture::new(&[("t.txt", "Plan:\n{x}")]);
        let prompt = fx
            .composer(200)
            .compose("t.txt", &[Binding::artifact_as("x", ArtifactKey::ProjectPlan)])
            .expect("compose never fails for a missing artifact");
        assert_eq!(prompt, "Plan:\n[artifact not found: project_plan]");
    }

    #[test]
    fn placeholders_take_artifacts_and_literals() {
        let fx = Fixture::new(&[(
            "eval.txt",
            "Case {case}\nPLAN\n{project_plan}\nDATA\n{data_json}\nINDEX\n{index_html}",
        )]);
        fx.store.write(ArtifactKey::ProjectPlan, "build three pages").unwrap();
        fx.store.write(ArtifactKey::Data, "[1,2]").unwrap();

        let prompt = fx
            .composer(200)
            .compose(
                "eval.txt",
                &[
                    Binding::literal("case", "demo"),
                    Binding::artifact(ArtifactKey::ProjectPlan),
                    Binding::artifact_as("data_json", ArtifactKey::Data),
                    Binding::artifact(ArtifactKey::IndexHtml),
                ],
            )
            .unwrap();

        assert_eq!(
            prompt,
            "Case demo\nPLAN\nbuild three pages\nDATA\n[1,2]\nINDEX\n[artifact not found: index_html]"
        );
    }

    #[test]
    fn unreferenced_artifacts_become_preamble() {
        let fx = Fixture::new(&[("html_index_prompt.txt", "Generate the home page.")]);
        fx.store.write(ArtifactKey::ProjectPlan, "the plan").unwrap();

        let prompt = fx
            .composer(200)
            .compose(
                "html_index_prompt.txt",
                &[
                    Binding::artifact(ArtifactKey::ProjectPlan),
                    Binding::artifact(ArtifactKey::Data),
                    Binding::literal("data_notice", "ignored when unreferenced"),
                ],
            )
            .unwrap();

        assert_eq!(
            prompt,
            "Project plan:\nthe plan\n\nData:\n[artifact not found: data]\n\nGenerate the home page."
        );
    }

    #[test]
    fn unbound_placeholders_and_css_braces_stay_verbatim() {
        let fx = Fixture::new(&[("t.txt", "body { margin: 0 } {unknown} {project_plan}")]);
        fx.store.write(ArtifactKey::ProjectPlan, "P").unwrap();

        let prompt = fx
            .composer(200)
            .compose("t.txt", &[Binding::artifact(ArtifactKey::ProjectPlan)])
            .unwrap();
        assert_eq!(prompt, "body { margin: 0 } {unknown} P");
    }

    #[test]
    fn substituted_content_is_not_rescanned() {
        let fx = Fixture::new(&[("t.txt", "{project_plan}")]);
        fx.store.write(ArtifactKey::ProjectPlan, "literal {data} text").unwrap();

        let prompt = fx
            .composer(200)
            .compose(
                "t.txt",
                &[
                    Binding::artifact(ArtifactKey::ProjectPlan),
                    Binding::literal("data", "SHOULD NOT APPEAR"),
                ],
            )
            .unwrap();
        assert_eq!(prompt, "literal {data} text");
    }

    #[test]
    fn artifact_bindings_are_truncated() {
        let fx = Fixture::new(&[("t.txt", "{data}")]);
        let content: String = (1..=5).map(|i| format!("line {i}\n")).collect();
        fx.store.write(ArtifactKey::Data, &content).unwrap();

        let prompt = fx
            .composer(2)
            .compose("t.txt", &[Binding::artifact(ArtifactKey::Data)])
            .unwrap();
        assert_eq!(prompt, "line 1\nline 2\n\n... (truncated, 5 lines total)");
    }

    #[test]
    fn missing_template_is_config_error() {
        let fx = Fixture::new(&[]);
        let err = fx.composer(200).compose("nope.txt", &[]).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn truncate_keeps_short_content() {
        assert_eq!(truncate_lines("a\nb", 200), "a\nb");
        assert_eq!(truncate_lines("a\nb\nc", 0), "a\nb\nc");
    }

    #[test]
    fn truncate_without_trailing_newline() {
        assert_eq!(
            truncate_lines("a\nb\nc", 1),
            "a\n\n... (truncated, 3 lines total)"
        );
    }

    #[test]
    fn list_cases_returns_directories() {
        let fx = Fixture::new(&[("plan_prompt.txt", "x")]);
        std::fs::create_dir_all(fx.root.join("cases").join("another")).unwrap();
        std::fs::write(fx.root.join("cases").join("README.md"), "not a case").unwrap();

        let cases = list_cases(&fx.root.join("cases")).unwrap();
        assert_eq!(cases, vec!["another".to_string(), "demo".to_string()]);
    }
}
