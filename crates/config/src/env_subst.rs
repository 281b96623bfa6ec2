use headlessd_metrics::{config as config_metrics, counter};

/// Replace `${ENV_VAR}` and `${ENV_VAR:-default}` placeholders in config
/// string values.
///
/// Unresolvable variables with no default are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace `${ENV_VAR}` / `${ENV_VAR:-default}` placeholders using a custom
/// lookup function.
///
/// This is the implementation used by [`substitute_env`]; the separate
/// signature makes it testable without mutating the process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut body = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                body.push(c);
            }
            if !closed {
                result.push_str("${");
                result.push_str(&body);
                continue;
            }

            let (var_name, default) = match body.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (body.as_str(), None),
            };

            if var_name.is_empty() {
                result.push_str("${");
                result.push_str(&body);
                result.push('}');
                continue;
            }

            match lookup(var_name) {
                Some(val) => result.push_str(&val),
                None => match default {
                    Some(default) => result.push_str(default),
                    None => {
                        counter!(config_metrics::ENV_SUBSTITUTION_FAILURES_TOTAL).increment(1);
                        result.push_str("${");
                        result.push_str(var_name);
                        result.push('}');
                    },
                },
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| match name {
            "HEADLESSD_TEST_VAR" => Some("hello".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute_env_with("key=${HEADLESSD_TEST_VAR}", lookup),
            "key=hello"
        );
    }

    #[test]
    fn leaves_unknown_var_without_default() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("${HEADLESSD_NONEXISTENT_XYZ}", lookup),
            "${HEADLESSD_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("url = \"${REDIS_URL:-redis://localhost:6379}\"", lookup),
            "url = \"redis://localhost:6379\""
        );
    }

    #[test]
    fn prefers_set_value_over_default() {
        let lookup = |name: &str| match name {
            "REDIS_URL" => Some("redis://prod:6379".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute_env_with("${REDIS_URL:-redis://localhost:6379}", lookup),
            "redis://prod:6379"
        );
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
