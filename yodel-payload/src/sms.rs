//! SMS body assembly.
//!
//! A body is `prefix + social suffix`, followed by an ending (the action prompt
//! and short link) that is never truncated.

const ELLIPSIS: &str = "...";

/// Fits `body + ending` into `max_length` characters.
///
/// When it doesn't fit, `body` is cut and `"..."` goes between what's left of
/// it and `ending`. An `ending` longer than `max_length` on its own is kept
/// whole.
pub fn truncate(body: &str, ending: &str, max_length: usize) -> String {
    let body_length = body.chars().count();
    let ending_length = ending.chars().count();

    if body_length + ending_length <= max_length {
        return format!("{body}{ending}");
    }

    let keep = max_length.saturating_sub(ending_length + ELLIPSIS.len());
    let kept: String = body.chars().take(keep).collect();

    format!("{kept}{ELLIPSIS}{ending}")
}

/// Collapses runs of exactly two periods, leaving ellipses alone
fn collapse_double_periods(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '.' {
            cleaned.push(c);
            continue;
        }

        let mut run = 1;
        while chars.next_if_eq(&'.').is_some() {
            run += 1;
        }

        let kept = if run == 2 { 1 } else { run };
        cleaned.extend(std::iter::repeat_n('.', kept));
    }

    cleaned
}

/// Punctuation fix-ups applied to every assembled SMS
pub fn cleanup(text: &str) -> String {
    let mut text = text.replace("\\n", "\n");

    while text.contains("  ") {
        text = text.replace("  ", " ");
    }

    let text = text.replace(". ...", "...");

    collapse_double_periods(text.trim())
}

/// Builds the final SMS text
pub fn assemble(prefix: &str, social: &str, ending: &str, link: &str, max_length: usize) -> String {
    let body = if social.is_empty() {
        prefix.trim_end().to_string()
    } else {
        format!("{} {social}", prefix.trim_end())
    };

    let tail: Vec<&str> = [ending.trim(), link.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

    let ending = if tail.is_empty() {
        String::new()
    } else {
        format!(" {}", tail.join(" "))
    };

    cleanup(&truncate(&body, &ending, max_length))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_truncate_keeps_ending() {
        let body = "A".repeat(200);
        let sms = truncate(&body, "!!", 160);

        assert_eq!(sms.chars().count(), 160);
        assert!(sms.ends_with("...!!"));
        assert!(sms.starts_with(&"A".repeat(155)));
    }

    #[test]
    fn test_truncate_short_body_untouched() {
        assert_eq!(truncate("Yo from ALICE", " Reply YO", 160), "Yo from ALICE Reply YO");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let body = "é".repeat(20);
        let sms = truncate(&body, "", 10);
        assert_eq!(sms.chars().count(), 10);
        assert!(sms.ends_with("..."));
    }

    #[test]
    fn test_cleanup() {
        assert_eq!(cleanup("Yo  from   ALICE"), "Yo from ALICE");
        assert_eq!(cleanup("Yo from Dr.. with BOB"), "Yo from Dr. with BOB");
        assert_eq!(cleanup("Wait for it..."), "Wait for it...");
        assert_eq!(cleanup("Hello there. ... Reply YO"), "Hello there... Reply YO");
        assert_eq!(cleanup("line\\nbreak"), "line\nbreak");
        assert_eq!(cleanup(" padded "), "padded");
    }

    #[test]
    fn test_assemble() {
        assert_eq!(
            assemble(
                "Yo from ALICE",
                "with BOB and 2 others",
                "Reply YO to Yo back:",
                "https://y0.to/a",
                160
            ),
            "Yo from ALICE with BOB and 2 others Reply YO to Yo back: https://y0.to/a"
        );
        assert_eq!(assemble("Yo from ALICE.", "", "", "", 160), "Yo from ALICE.");
    }

    #[test]
    fn test_assemble_truncates_before_link() {
        let text = "B".repeat(300);
        let sms = assemble(&text, "", "Tap:", "https://y0.to/a", 160);

        assert!(sms.chars().count() <= 160);
        assert!(sms.ends_with("... Tap: https://y0.to/a"));
    }
}
