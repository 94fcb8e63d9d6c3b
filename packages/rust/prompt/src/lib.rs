//! Prompt composition and response cleanup.
//!
//! - [`PromptComposer`]: binds case templates to artifacts and literals
//! - [`sanitize`]: strips code-fence wrapping from a model response
//! - [`validate`]: optional, separate syntactic check of sanitized content

mod sanitize;
mod template;
mod validate;

pub use sanitize::{ContentKind, extract_fenced, sanitize};
pub use template::{
    Binding, BindingValue, PromptComposer, TemplateSet, list_cases, missing_marker,
    truncate_lines,
};
pub use validate::{validate, validate_records};
