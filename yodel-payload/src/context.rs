/// Values a copy template can reference. Anything missing renders as an
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatContext {
    pub sender: String,
    pub text: String,
    pub city: String,
    pub group: String,
    pub social: String,
    /// Sender of the Yo being forwarded
    pub origin: String,
}

impl FormatContext {
    fn value(&self, placeholder: &str) -> &str {
        match placeholder {
            "sender" => &self.sender,
            "text" => &self.text,
            "city" => &self.city,
            "group" => &self.group,
            "social" => &self.social,
            "origin" => &self.origin,
            _ => "",
        }
    }

    /// Substitutes `{name}` placeholders in `template`.
    ///
    /// Unknown placeholders render empty; an unterminated `{` is kept as is.
    pub fn render(&self, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len() + self.sender.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start + 1..];

            match tail.find('}') {
                Some(end) => {
                    rendered.push_str(self.value(&tail[..end]));
                    rest = &tail[end + 1..];
                }
                None => {
                    rendered.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

pub fn references_social(template: &str) -> bool {
    template.contains("{social}")
}
