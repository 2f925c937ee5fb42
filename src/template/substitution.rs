//! Variable substitution engine for templates

/// Substitute `{{variable}}` placeholders in a template string.
///
/// Keys not present in the variable map render as the empty string; a send
/// never fails because copy referenced a variable the caller didn't supply.
/// Malformed placeholders (an opening `{{` with no closing `}}`) are passed
/// through verbatim.
pub fn substitute_str(
    template: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => {
                let key = after_open[..end].trim();
                if let Some(value) = variables.get(key) {
                    result.push_str(&value_to_string(value));
                }
                // Unknown key: render nothing
                rest = &after_open[end + 2..];
            }
            None => {
                // No closing braces; keep the remainder as-is
                result.push_str(&rest[start..]);
                return result;
            }
        }
    }

    result.push_str(rest);
    result
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        // For arrays and objects, use JSON representation
        _ => value.to_string(),
    }
}
