//! Template selection

use crate::config::{TemplateConfig, DEFAULT_TEMPLATE};
use crate::services::PageRequest;

/// Pick the template a request should be rendered with.
///
/// Precedence: the only configured template, then a configured `template`
/// query parameter, then the template of the request's current page, then
/// the first configured template.
pub fn select_template(templates: &[TemplateConfig], request: &PageRequest) -> String {
    let first = match templates {
        [] => return DEFAULT_TEMPLATE.to_string(),
        [only] => return only.name.clone(),
        [first, ..] => first,
    };

    if let Some(requested) = request.query_param("template") {
        if templates.iter().any(|t| t.name == requested) {
            return requested.to_string();
        }
    }

    if let Some(page) = &request.current_page {
        return page.get_template().to_string();
    }

    first.name.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn templates() -> Vec<TemplateConfig> {
        vec![
            TemplateConfig::new("page.html", "Page"),
            TemplateConfig::new("wide.html", "Wide"),
        ]
    }

    fn page_with_template(template: &str) -> Page {
        let now = Utc::now();
        Page {
            id: 1,
            node_id: 1,
            publisher_is_draft: false,
            publisher_public_id: None,
            is_home: false,
            template: template.to_string(),
            publication_date: None,
            publication_end_date: None,
            created_by: "admin".to_string(),
            changed_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
            node: None,
            title_cache: BTreeMap::new(),
        }
    }

    #[test]
    fn test_empty_list_falls_back_to_default() {
        assert_eq!(select_template(&[], &PageRequest::new("/")), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_query_parameter_must_be_configured() {
        let request = PageRequest::new("/").with_query("template", "wide.html");
        assert_eq!(select_template(&templates(), &request), "wide.html");

        let request = PageRequest::new("/").with_query("template", "unknown.html");
        assert_eq!(select_template(&templates(), &request), "page.html");
    }

    #[test]
    fn test_current_page_template_beats_default() {
        let mut request = PageRequest::new("/");
        request.current_page = Some(page_with_template("wide.html"));
        assert_eq!(select_template(&templates(), &request), "wide.html");
    }

    #[test]
    fn test_query_parameter_beats_current_page() {
        let mut request = PageRequest::new("/").with_query("template", "page.html");
        request.current_page = Some(page_with_template("wide.html"));
        assert_eq!(select_template(&templates(), &request), "page.html");
    }

    proptest! {
        #[test]
        fn prop_single_template_always_wins(
            name in "[a-z]{1,12}\\.html",
            requested in "[a-z]{0,12}",
            page_template in "[a-z]{1,12}",
        ) {
            let configured = vec![TemplateConfig::new(name.clone(), "Only")];
            let mut request = PageRequest::new("/").with_query("template", &requested);
            request.current_page = Some(page_with_template(&page_template));
            prop_assert_eq!(select_template(&configured, &request), name);
        }
    }
}
