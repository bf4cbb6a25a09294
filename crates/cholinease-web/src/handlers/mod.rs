//! HTTP handlers for all web routes.

pub mod predict;
pub mod api;

use cholinease_common::CholinEaseError;

/// Escape text for interpolation into HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// User-facing message for a failed prediction.
pub fn describe_error(err: &CholinEaseError) -> String {
    match err {
        CholinEaseError::ModelNotFound(_) => format!("Error: {}", err),
        CholinEaseError::Model(msg) => format!("Error in model prediction: {}", msg),
        CholinEaseError::InvalidInput(msg) => msg.clone(),
        e if e.is_file_error() => format!("File error: {}", e),
        e => format!("Unexpected error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">O=C&'"#), "&lt;a href=&quot;x&quot;&gt;O=C&amp;&#39;");
    }

    #[test]
    fn test_error_messages() {
        let missing = CholinEaseError::ModelNotFound(PathBuf::from("acetylcholinesterase_model.json"));
        assert_eq!(describe_error(&missing), "Error: Model file 'acetylcholinesterase_model.json' not found.");

        let csv = CholinEaseError::DescriptorFileNotFound(PathBuf::from("PubChem_app_data.csv"));
        assert!(describe_error(&csv).starts_with("File error:"));

        let model = CholinEaseError::Model("X has 3 features".into());
        assert_eq!(describe_error(&model), "Error in model prediction: X has 3 features");

        let other = CholinEaseError::MissingFeature("KRFP1".into());
        assert!(describe_error(&other).starts_with("Unexpected error:"));
    }
}
