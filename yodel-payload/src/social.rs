//! The "with A, B and N others" fragment of group Yos.

fn others(count: usize) -> String {
    if count == 1 {
        "1 other".to_string()
    } else {
        format!("{count} others")
    }
}

/// Summarises the other people a group Yo went to.
///
/// At most two names are spelled out, anyone beyond that is folded into the
/// "others" count.
pub fn social_text(named: &[String], unnamed: usize) -> String {
    let shown = &named[..named.len().min(2)];
    let rest = unnamed + (named.len() - shown.len());

    match (shown.first(), shown.get(1), rest > 0) {
        (None, _, false) => String::new(),
        (None, _, true) => format!("with {}", others(rest)),
        (Some(a), None, false) => format!("with {a}"),
        (Some(a), None, true) => format!("with {a} and {}", others(rest)),
        (Some(a), Some(b), false) => format!("with {a} and {b}"),
        (Some(a), Some(b), true) => format!("with {a}, {b} and {}", others(rest)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_social_table() {
        assert_eq!(social_text(&[], 0), "");
        assert_eq!(social_text(&[], 1), "with 1 other");
        assert_eq!(social_text(&[], 4), "with 4 others");
        assert_eq!(social_text(&names(&["BOB"]), 0), "with BOB");
        assert_eq!(social_text(&names(&["BOB"]), 2), "with BOB and 2 others");
        assert_eq!(social_text(&names(&["BOB", "CAROL"]), 0), "with BOB and CAROL");
        assert_eq!(
            social_text(&names(&["BOB", "CAROL"]), 1),
            "with BOB, CAROL and 1 other"
        );
    }

    #[test]
    fn test_extra_names_become_others() {
        assert_eq!(
            social_text(&names(&["BOB", "CAROL", "DAN"]), 1),
            "with BOB, CAROL and 2 others"
        );
    }
}
