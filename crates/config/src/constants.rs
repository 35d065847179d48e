//! The `APP_CONSTANTS` file: plain `KEY=VALUE` lines holding catalog credentials.

use crate::CredentialSettings;

pub const APP_CONSTANTS_FILE: &str = "APP_CONSTANTS";

/// Extracts `RA_USERNAME` and `RA_API_KEY`.
///
/// Blank lines, `#` comments, lines without `=` and unknown keys are
/// ignored. Values may be wrapped in single or double quotes.
pub fn parse_app_constants(text: &str) -> CredentialSettings {
    let mut credentials = CredentialSettings::default();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "RA_USERNAME" => credentials.username = Some(value.to_string()),
            "RA_API_KEY" => credentials.api_key = Some(value.to_string()),
            _ => {},
        }
    }
    credentials
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)))
        .unwrap_or(value)
}
