use validator::ValidationErrors;

/// Flatten validation errors into one message, ordered by field name
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut messages = Vec::new();
    for (field, field_errors) in fields {
        for error in field_errors {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Valor inválido para el campo '{}'", field));
            messages.push(message);
        }
    }

    messages.join(", ")
}
