//! Configuration read from environment variables.

/// Interpret a string value such as "1" or "no" as a boolean, or return
/// `None` if it is not recognized.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Interpret the value of a feature flag variable `name`, or return
/// `default` if the variable is unset or unrecognized.
pub fn parse_flag(name: &str, value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    parse_bool(value).unwrap_or_else(|| {
        eprintln!("Unrecognized boolean value \"{}\" for {}", value, name);
        default
    })
}

/// Interpret the value of variable `name` as an integer, or return `None` if
/// it is unset or not a non-negative integer.
pub fn parse_usize(name: &str, value: Option<&str>) -> Option<usize> {
    let value = value?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            eprintln!("Unrecognized integer value \"{}\" for {}", value, name);
            None
        }
    }
}
