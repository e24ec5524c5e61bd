//! Text preparation before synthesis.

/// Rewrites written forms that speech models tend to mispronounce.
///
/// - numeric ranges: `10-15` becomes `10 to 15`
/// - `www.` is spelled out and `.com` becomes ` dot com`
/// - the standalone acronym `AI` is spaced out as `A I`
pub fn verbalize(text: &str) -> String {
    let text = spell_ranges(text);
    let text = text
        .replace("www.", "double you double you double you dot ")
        .replace("WWW.", "double you double you double you dot ")
        .replace(".com", " dot com");
    replace_word(&text, "AI", "A I")
}

fn is_range_dash(c: char) -> bool {
    matches!(c, '-' | '\u{2010}' | '\u{2011}' | '\u{2013}')
}

fn spell_ranges(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_ascii_digit()
            && chars[i + 1].is_ascii_digit();
        if is_range_dash(c) && between_digits {
            out.push_str(" to ");
        } else {
            out.push(c);
        }
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replaces `word` only where it is not part of a longer word.
fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(pos) = rest.find(word) {
        let before = rest[..pos].chars().next_back().or(prev);
        let after = rest[pos + word.len()..].chars().next();
        let bounded = !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char);

        out.push_str(&rest[..pos]);
        out.push_str(if bounded { replacement } else { word });
        prev = word.chars().next_back();
        rest = &rest[pos + word.len()..];
    }
    out.push_str(rest);
    out
}

fn is_sentence_break(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | ';' | ':' | '。' | '！' | '？' | '\n')
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if is_sentence_break(ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                units.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        units.push(trimmed.to_string());
    }
    units
}

/// Breaks a sentence that alone exceeds `max_chars` at word boundaries,
/// and a single overlong word at character boundaries.
fn split_overlong(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in sentence.split_whitespace() {
        let word_chars = word.chars().count();
        let sep = usize::from(!current.is_empty());
        if current_chars + sep + word_chars <= max_chars {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_chars += sep + word_chars;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if word_chars <= max_chars {
            current.push_str(word);
            current_chars = word_chars;
            continue;
        }
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            out.push(piece.iter().collect());
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Splits `text` into synthesis chunks of at most `max_chars` characters,
/// cutting at sentence boundaries and packing short neighbouring sentences
/// together. Text within the budget (or a budget of 0) yields one chunk.
pub fn split_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 || trimmed.chars().count() <= max_chars {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in split_sentences(trimmed) {
        let sentence_chars = sentence.chars().count();
        if sentence_chars > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            chunks.extend(split_overlong(&sentence, max_chars));
            continue;
        }
        let sep = usize::from(!current.is_empty());
        if current_chars + sep + sentence_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(&sentence);
        current_chars += sentence_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
