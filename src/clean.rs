//! Text cleanup for speakable snippets
//!
//! Page text comes out of the DOM with layout whitespace, the odd leaked
//! markup character and no length bound. Everything spoken aloud goes
//! through [`clean`] first.

/// Maximum length of a cleaned snippet, in characters
pub const MAX_SNIPPET_CHARS: usize = 150;

const STRIPPED: [char; 4] = ['<', '>', '{', '}'];
const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Normalize raw page text into a short, speakable snippet.
///
/// Strips `< > { }`, collapses whitespace runs into single spaces and trims.
/// Text longer than [`MAX_SNIPPET_CHARS`] is cut after the last sentence
/// terminator inside the limit, else at the last space, else hard.
#[hotpath::measure]
pub fn clean(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !STRIPPED.contains(c)).collect();
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.chars().count() <= MAX_SNIPPET_CHARS {
        return normalized;
    }

    let window: Vec<char> = normalized.chars().take(MAX_SNIPPET_CHARS).collect();
    let cut = match window.iter().rposition(|c| SENTENCE_END.contains(c)) {
        Some(end) => end + 1,
        None => match window.iter().rposition(|&c| c == ' ') {
            Some(space) if space > 0 => space,
            _ => window.len(),
        },
    };

    window[..cut].iter().collect()
}

/// A piece of page text together with its cleaned, speakable form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableSnippet {
    pub raw_text: String,
    pub cleaned_text: String,
}

impl ReadableSnippet {
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let cleaned_text = clean(&raw_text);
        Self {
            raw_text,
            cleaned_text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned_text.is_empty()
    }
}
