use std::collections::HashMap;

use serde_yaml::Value;

use super::raw::RawServiceMap;

/// Substitute `${VAR}`/`$VAR` references in every scalar of every service
/// field. This is best-effort text substitution: unresolvable references are
/// left verbatim and logged, never an error.
pub fn interpolate_raw_service_map(
    services: &mut RawServiceMap,
    variables: &HashMap<String, String>,
) {
    for (name, service) in services.iter_mut() {
        for (field, value) in service.iter_mut() {
            interpolate(&format!("{name}.{field}"), value, variables);
        }
    }
}

pub fn interpolate(context: &str, value: &mut Value, variables: &HashMap<String, String>) {
    match value {
        Value::String(s) => *s = interpolate_string(context, s, variables),

        Value::Sequence(seq) => {
            for item in seq {
                interpolate(context, item, variables);
            }
        }

        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                interpolate(context, item, variables);
            }
        }

        Value::Tagged(tagged) => interpolate(context, &mut tagged.value, variables),

        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn interpolate_string(context: &str, input: &str, variables: &HashMap<String, String>) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            // $$ escapes a literal dollar
            Some('$') => {
                out.push('$');
                i += 2;
            }

            Some('{') => match chars[i + 2..].iter().position(|&c| c == '}') {
                Some(end) => {
                    let name: String = chars[i + 2..i + 2 + end].iter().collect();

                    match resolve(&name, variables) {
                        Some(value) => out.push_str(&value),
                        None => {
                            log::warn!("Could not resolve ${{{name}}} in {context}");
                            out.push_str(&format!("${{{name}}}"));
                        }
                    }

                    i += end + 3;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },

            Some(&c) if c == '_' || c.is_ascii_alphabetic() => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end] == '_' || chars[end].is_ascii_alphanumeric())
                {
                    end += 1;
                }

                let name: String = chars[i + 1..end].iter().collect();

                match resolve(&name, variables) {
                    Some(value) => out.push_str(&value),
                    None => {
                        log::warn!("Could not resolve ${name} in {context}");
                        out.push('$');
                        out.push_str(&name);
                    }
                }

                i = end;
            }

            _ => {
                out.push('$');
                i += 1;
            }
        }
    }

    out
}

fn resolve(name: &str, variables: &HashMap<String, String>) -> Option<String> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c == '_' || c.is_ascii_alphanumeric())
    {
        return None;
    }

    variables.get(name).cloned()
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_both_reference_forms() {
        let variables = vars(&[("IMAGE", "nginx"), ("TAG", "1.25")]);

        assert_eq!(
            interpolate_string("web.image", "${IMAGE}:$TAG", &variables),
            "nginx:1.25"
        );
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let variables = vars(&[]);

        assert_eq!(
            interpolate_string("web.image", "${MISSING}/$ALSO_MISSING", &variables),
            "${MISSING}/$ALSO_MISSING"
        );
    }

    #[test]
    fn test_dollar_escape() {
        let variables = vars(&[("A", "x")]);

        assert_eq!(
            interpolate_string("web.command", "echo $$A is not $A", &variables),
            "echo $A is not x"
        );
    }

    #[test]
    fn test_walks_nested_values() {
        let variables = vars(&[("PORT", "8080")]);
        let mut value: Value =
            serde_yaml::from_str("ports:\n  - '${PORT}:80'\nnested:\n  inner: $PORT\n").unwrap();

        interpolate("web", &mut value, &variables);

        assert_eq!(
            value["ports"][0].as_str(),
            Some("8080:80")
        );
        assert_eq!(value["nested"]["inner"].as_str(), Some("8080"));
    }
}
