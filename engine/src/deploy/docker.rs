//! Helper-container command wrapping

use crate::authn::secret::MaskedText;

/// Quote `text` as one single-quoted shell word
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Run `command` inside the helper container named after the deployment
///
/// Single quotes in the command are escaped so the inner shell sees the
/// exact command text.
pub fn execute_in_container(container: &str, command: &str) -> String {
    format!("docker exec {} bash -c {}", container, shell_quote(command))
}

/// Wrap a masked command, keeping both renderings in step
pub fn wrap(container: &str, command: &MaskedText) -> MaskedText {
    command.map(|text| execute_in_container(container, text))
}
