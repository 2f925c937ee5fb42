use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::substitution::substitute_str;

/// A stored email template: subject plus header/body/footer fragments in
/// rich and plain variants. Fragments are `{{variable}}` templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// Stable key used by callers and the queue
    pub key: String,
    pub subject: String,
    pub html_header: String,
    pub html_body: String,
    pub html_footer: String,
    pub text_body: String,
    pub updated_at: DateTime<Utc>,
}

/// A template rendered against a variable context, ready for a transport.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailTemplate {
    /// Render subject and both body variants. Unresolved placeholders render
    /// as empty strings, never as errors.
    pub fn render(&self, variables: &serde_json::Map<String, serde_json::Value>) -> RenderedEmail {
        let html = format!(
            "{}{}{}",
            substitute_str(&self.html_header, variables),
            substitute_str(&self.html_body, variables),
            substitute_str(&self.html_footer, variables),
        );

        RenderedEmail {
            subject: substitute_str(&self.subject, variables),
            html,
            text: substitute_str(&self.text_body, variables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> EmailTemplate {
        EmailTemplate {
            key: "test".to_string(),
            subject: "Hello {{name}}".to_string(),
            html_header: "<header>{{product_name}}</header>".to_string(),
            html_body: "<p>Hi {{name}}</p>".to_string(),
            html_footer: "<footer>{{current_year}}</footer>".to_string(),
            text_body: "Hi {{name}}".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_assembles_fragments() {
        let vars = json!({"name": "Ada", "product_name": "Fete", "current_year": 2026});
        let rendered = template().render(vars.as_object().unwrap());

        assert_eq!(rendered.subject, "Hello Ada");
        assert_eq!(
            rendered.html,
            "<header>Fete</header><p>Hi Ada</p><footer>2026</footer>"
        );
        assert_eq!(rendered.text, "Hi Ada");
    }

    #[test]
    fn test_render_missing_variable_is_empty() {
        let vars = json!({"product_name": "Fete"});
        let rendered = template().render(vars.as_object().unwrap());

        assert_eq!(rendered.subject, "Hello ");
        assert_eq!(rendered.text, "Hi ");
    }
}
