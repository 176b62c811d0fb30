/// Pluggable naming fallback, consulted after explicit configuration and
/// before default naming (field name as-is, `{TypeName}s` for tables).
///
/// `None` means "no opinion": resolution falls through to the default.
pub trait NamingConvention: Send + Sync {
    fn table_name(&self, entity: &str) -> Option<String> {
        let _ = entity;
        None
    }

    fn column_name(&self, entity: &str, field: &str) -> Option<String> {
        let _ = (entity, field);
        None
    }
}

/// snake_cases column names and pluralizes snake_cased table names,
/// e.g. `OrderLine` -> `order_lines`, field `createdAt` -> `created_at`.
pub struct SnakeCasePlural;

impl NamingConvention for SnakeCasePlural {
    fn table_name(&self, entity: &str) -> Option<String> {
        Some(format!("{}s", to_snake_case(entity)))
    }

    fn column_name(&self, entity: &str, field: &str) -> Option<String> {
        let _ = entity;
        Some(to_snake_case(field))
    }
}

fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower = false;

    for ch in input.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_cases_identifiers() {
        assert_eq!(to_snake_case("OrderLine"), "order_line");
        assert_eq!(to_snake_case("parentId"), "parent_id");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("HTTPServer"), "httpserver");
    }

    #[test]
    fn convention_pluralizes_tables() {
        let convention = SnakeCasePlural;
        assert_eq!(convention.table_name("OrderLine"), Some("order_lines".into()));
        assert_eq!(convention.column_name("OrderLine", "lineTotal"), Some("line_total".into()));
    }
}
