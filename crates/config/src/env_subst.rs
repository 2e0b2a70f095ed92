/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(val) => out.push_str(&val),
                    // Leave unresolved placeholders untouched.
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            // Malformed (`${}` or unterminated) — emit literally.
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        // PATH is present in any test environment.
        let path = std::env::var("PATH").unwrap();
        assert_eq!(substitute_env("key=${PATH}"), format!("key={path}"));
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env("${ENXAME_NONEXISTENT_XYZ}"),
            "${ENXAME_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }

    #[test]
    fn empty_braces_emit_literally() {
        assert_eq!(substitute_env("a${}b"), "a${}b");
    }
}
