//! Window title normalization.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Characters that decorate the start of an agent-renamed window title
fn is_decoration(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::OtherSymbol
            | GeneralCategory::ModifierSymbol
            | GeneralCategory::Format
            | GeneralCategory::NonspacingMark
            | GeneralCategory::Surrogate
            | GeneralCategory::SpaceSeparator
    )
}

/// Strip the leading run of emoji/symbol code points from a title.
///
/// `"🤖 My Session"` becomes `"My Session"`; variation selectors, zero-width
/// joiners and spaces inside the run go with it. Idempotent.
pub fn strip_leading_symbols(title: &str) -> &str {
    title.trim_start_matches(is_decoration)
}

/// Whether a window still carries a shell's default title, i.e. it was never
/// renamed for a session and cannot be found again by title later.
pub fn is_generic_shell_title(title: &str, generic_titles: &[String]) -> bool {
    let title = strip_leading_symbols(title).trim();
    if title.is_empty() {
        return true;
    }

    let lowered = title.to_lowercase();
    if generic_titles.iter().any(|g| g.to_lowercase() == lowered) {
        return true;
    }

    // Executable paths, e.g. C:\WINDOWS\system32\cmd.exe or /usr/bin/zsh
    let program = lowered
        .rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or(lowered.as_str());
    let program = program.strip_suffix(".exe").unwrap_or(program);
    let looks_like_path =
        lowered.contains('\\') || lowered.contains('/') || lowered.ends_with(".exe");
    looks_like_path
        && (matches!(program, "cmd" | "powershell" | "pwsh")
            || generic_titles.iter().any(|g| g.to_lowercase() == program))
}
