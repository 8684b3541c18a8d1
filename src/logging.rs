/// Elides page content from log fields unless `dangerous-logging` is enabled.
#[allow(clippy::non_ascii_literal)]
pub(crate) fn content(text: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		text
	} else {
		"…"
	}
}
