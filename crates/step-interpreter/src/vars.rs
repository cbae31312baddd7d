//! `${index}` / `${total}` token substitution for loop iterations.

use webharvest_core_types::{FieldSpec, Step};

/// Return a copy of `step` with loop tokens substituted into every string
/// parameter, including nested steps and extraction fields.
pub fn substitute(step: &Step, index: usize, total: usize) -> Step {
    let sub = |value: &str| -> String {
        value
            .replace("${index}", &index.to_string())
            .replace("${total}", &total.to_string())
    };
    let sub_fields = |fields: &[FieldSpec]| -> Vec<FieldSpec> {
        fields
            .iter()
            .map(|field| FieldSpec {
                name: sub(&field.name),
                selector: sub(&field.selector),
                attribute: field.attribute.as_deref().map(sub),
            })
            .collect()
    };

    match step {
        Step::Navigate { url, timeout_ms } => Step::Navigate {
            url: sub(url),
            timeout_ms: *timeout_ms,
        },
        Step::Wait {
            selector,
            duration_ms,
            timeout_ms,
        } => Step::Wait {
            selector: selector.as_deref().map(sub),
            duration_ms: *duration_ms,
            timeout_ms: *timeout_ms,
        },
        Step::Click { selector } => Step::Click {
            selector: sub(selector),
        },
        Step::Fill { selector, value } => Step::Fill {
            selector: sub(selector),
            value: sub(value),
        },
        Step::Extract { selector, fields } => Step::Extract {
            selector: sub(selector),
            fields: sub_fields(fields),
        },
        Step::Paginate {
            selector,
            max_pages,
            item_selector,
            fields,
        } => Step::Paginate {
            selector: sub(selector),
            max_pages: *max_pages,
            item_selector: item_selector.as_deref().map(sub),
            fields: fields.as_deref().map(sub_fields),
        },
        Step::Loop {
            selector,
            steps,
            max_iterations,
        } => Step::Loop {
            selector: sub(selector),
            steps: steps
                .iter()
                .map(|nested| substitute(nested, index, total))
                .collect(),
            max_iterations: *max_iterations,
        },
        Step::NavigateBack { count } => Step::NavigateBack { count: *count },
        Step::SessionLoad {
            session_name,
            sessions_dir,
        } => Step::SessionLoad {
            session_name: sub(session_name),
            sessions_dir: sessions_dir.clone(),
        },
        Step::SessionSave {
            session_name,
            sessions_dir,
            ttl_hours,
        } => Step::SessionSave {
            session_name: sub(session_name),
            sessions_dir: sessions_dir.clone(),
            ttl_hours: *ttl_hours,
        },
    }
}
