//! Localized line text: the line-id lookup, the string table, and the
//! conventions lines carry in their text (speaker prefix, `[seq=...]`).

use std::collections::{BTreeMap, HashMap};

/// Text of one line, keyed by locale.
pub type LocalizedText = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct LineTable {
    ids: HashMap<(String, u32), String>,
    strings: BTreeMap<String, LocalizedText>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_id(&mut self, conversation: impl Into<String>, line: u32, line_id: impl Into<String>) {
        self.ids.insert((conversation.into(), line), line_id.into());
    }

    pub fn insert_text(&mut self, line_id: impl Into<String>, text: LocalizedText) {
        self.strings.insert(line_id.into(), text);
    }

    /// Line id of the line at `line` in `conversation`.
    pub fn line_id(&self, conversation: &str, line: u32) -> Option<&str> {
        self.ids
            .get(&(conversation.to_string(), line))
            .map(String::as_str)
    }

    pub fn text(&self, line_id: &str) -> Option<&LocalizedText> {
        self.strings.get(line_id)
    }

    /// Text of a line statement: by its own id, else by position.
    pub fn resolve(&self, line_id: Option<&str>, conversation: &str, line: u32) -> Option<(&str, &LocalizedText)> {
        let id = match line_id {
            Some(id) => id,
            None => self.line_id(conversation, line)?,
        };
        let (key, text) = self.strings.get_key_value(id)?;
        Some((key.as_str(), text))
    }

    /// Every localized text in the table.
    pub fn texts(&self) -> impl Iterator<Item = &LocalizedText> {
        self.strings.values()
    }
}

/// The text speaker prefixes and markup are read from: the default
/// locale's, or the first locale's when the line lacks it.
pub fn default_text<'t>(text: &'t LocalizedText, default_locale: &str) -> Option<&'t str> {
    text.get(default_locale)
        .or_else(|| text.values().next())
        .map(String::as_str)
}

/// Split `Name: text` into the speaker and the remaining text.
///
/// The name is everything before the first colon; it must be non-empty,
/// must not contain markup characters and the colon must be followed by
/// whitespace.
pub fn split_speaker(text: &str) -> (Option<&str>, &str) {
    let Some(colon) = text.find(':') else {
        return (None, text);
    };
    let name = text[..colon].trim();
    let rest = &text[colon + 1..];
    let followed_by_space = rest.chars().next().is_some_and(char::is_whitespace);
    let plain = !name.is_empty() && !name.contains(['[', ']', '{', '}', '<', '>', '"']);
    if plain && followed_by_space {
        (Some(name), rest.trim_start())
    } else {
        (None, text)
    }
}

/// The sequence a line asks for with a trailing `[seq=...]` or
/// `[seq="..."]` markup tag.
pub fn sequence_markup(text: &str) -> Option<String> {
    let body = text.trim_end().strip_suffix("/]")?.trim_end();
    let open = body.rfind("[seq=")?;
    if open > 0 && body[..open].ends_with('\\') {
        return None;
    }
    let value = &body[open + "[seq=".len()..];
    let value = match value.strip_prefix('"') {
        Some(quoted) => quoted.strip_suffix('"')?,
        None if value.contains(char::is_whitespace) => return None,
        None => value,
    };
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_prefix() {
        assert_eq!(split_speaker("Mae: Hi there"), (Some("Mae"), "Hi there"));
        assert_eq!(split_speaker("Old Tom: Evening."), (Some("Old Tom"), "Evening."));
        assert_eq!(split_speaker("No speaker here"), (None, "No speaker here"));
        assert_eq!(split_speaker("Time 10:30"), (None, "Time 10:30"));
        assert_eq!(split_speaker(": empty"), (None, ": empty"));
    }

    #[test]
    fn default_text_falls_back_to_another_locale() {
        let both = LocalizedText::from([
            ("en".to_string(), "Mae: Hi".to_string()),
            ("fr".to_string(), "Mae: Salut".to_string()),
        ]);
        assert_eq!(default_text(&both, "fr"), Some("Mae: Salut"));
        let french = LocalizedText::from([("fr".to_string(), "Mae: Salut".to_string())]);
        assert_eq!(default_text(&french, "en"), Some("Mae: Salut"));
        assert_eq!(default_text(&LocalizedText::new(), "en"), None);
    }

    #[test]
    fn lookup_by_id_or_position() {
        let mut table = LineTable::new();
        table.insert_id("Start", 3, "line:a");
        table.insert_text("line:a", LocalizedText::from([("en".to_string(), "Hi".to_string())]));

        let (id, text) = table.resolve(None, "Start", 3).unwrap();
        assert_eq!(id, "line:a");
        assert_eq!(text["en"], "Hi");
        assert!(table.resolve(Some("line:a"), "Other", 9).is_some());
        assert!(table.resolve(None, "Start", 4).is_none());
    }

    #[test]
    fn sequence_markup_forms() {
        assert_eq!(
            sequence_markup(r#"Look! [seq="Camera(Closeup)"/]"#).as_deref(),
            Some("Camera(Closeup)")
        );
        assert_eq!(sequence_markup("[seq=Delay(2)/]").as_deref(), Some("Delay(2)"));
        assert_eq!(sequence_markup(r"Not a tag \[seq=x/]"), None);
        assert_eq!(sequence_markup("Plain text"), None);
    }
}
