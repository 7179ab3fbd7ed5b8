//! Text normalization: English word tokenization, lowercasing, stopword and punctuation removal.

mod lexical;
mod stopwords;

pub use lexical::{best_intent, score, IntentScores};
pub use stopwords::is_stopword;

/// Lowercases `text`, splits it into word-like tokens and keeps only purely alphanumeric,
/// non-stopword tokens. Pure and deterministic; empty input yields no tokens.
pub fn normalize(text: &str) -> Vec<String> {
    tokenize(&text.to_lowercase())
        .into_iter()
        .filter(|t| t.chars().all(char::is_alphanumeric))
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Punctuation that is always a token of its own.
const STANDALONE: &[char] = &[
    '?', '!', ';', '@', '#', '$', '%', '&', '(', ')', '[', ']', '{', '}', '<', '>', '"', '`',
];

/// Clitic suffixes split off the end of a word, longest first.
const CLITICS: [&str; 7] = ["n't", "'ll", "'re", "'ve", "'s", "'m", "'d"];

/// Fused words split in two (`cannot` -> `can`, `not`).
const FUSED: [(&str, usize); 6] = [
    ("cannot", 3),
    ("gimme", 3),
    ("gonna", 3),
    ("gotta", 3),
    ("lemme", 3),
    ("wanna", 3),
];

/// Treebank-style word tokenizer for English text.
///
/// Whitespace separates chunks. Inside a chunk the bracket, quote and sentence punctuation in
/// `STANDALONE` always splits off; `,` and `:` split off unless a digit follows (`3,000` stays
/// whole); a period splits off only at the end of a word, so `e.g` and `3.5` stay whole.
/// `-`, `/` and other symbols stay inside the word. Contractions split before the clitic
/// (`can't` -> `ca`, `n't`; `she's` -> `she`, `'s`).
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for chunk in text.split_whitespace() {
        let chars: Vec<char> = chunk.chars().map(|c| if c == '\u{2019}' { '\'' } else { c }).collect();
        let mut words = Vec::new();
        let mut current = String::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            let run = if chars[i..].starts_with(&['.', '.', '.']) {
                Some("...")
            } else if chars[i..].starts_with(&['-', '-']) {
                Some("--")
            } else {
                None
            };
            if let Some(run) = run {
                flush_word(&mut current, &mut words);
                words.push(run.to_string());
                i += run.len();
                continue;
            }
            let stands_alone = STANDALONE.contains(&c)
                || (matches!(c, ',' | ':') && !next.is_some_and(|n| n.is_ascii_digit()));
            if stands_alone {
                flush_word(&mut current, &mut words);
                words.push(c.to_string());
            } else {
                current.push(c);
            }
            i += 1;
        }
        flush_word(&mut current, &mut words);
        for word in words {
            split_clitics(word, &mut tokens);
        }
    }
    tokens
}

/// Pushes the pending word, with a trailing period split off.
fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let mut word = std::mem::take(current);
    if word.len() > 1 && word.ends_with('.') && !word.ends_with("..") {
        word.pop();
        words.push(word);
        words.push(".".to_string());
    } else {
        words.push(word);
    }
}

fn split_clitics(word: String, out: &mut Vec<String>) {
    let mut word = word.as_str();
    if word.len() > 1 && word.starts_with('\'') && !CLITICS.iter().any(|c| *c == word) {
        out.push("'".to_string());
        word = &word[1..];
    }
    if let Some((fused, at)) = FUSED.iter().find(|(f, _)| *f == word) {
        out.push(fused[..*at].to_string());
        out.push(fused[*at..].to_string());
        return;
    }
    let clitic = CLITICS
        .iter()
        .copied()
        .find(|c| word.len() > c.len() && word.ends_with(*c))
        .or_else(|| (word.len() > 1 && word.ends_with('\'')).then_some("'"));
    match clitic {
        Some(clitic) => {
            let stem = &word[..word.len() - clitic.len()];
            if stem.ends_with('\'') {
                out.push(word.to_string());
            } else {
                out.push(stem.to_string());
                out.push(clitic.to_string());
            }
        }
        None => out.push(word.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_drops_stopwords_and_punctuation() {
        assert_eq!(normalize("Where is my ORDER?!"), vec!["order"]);
        assert_eq!(normalize("Hello, I want a refund."), vec!["hello", "want", "refund"]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \t\n").is_empty());
    }

    #[test]
    fn hyphenated_and_slashed_words_are_discarded_as_non_alphanumeric() {
        assert_eq!(normalize("e-mail support"), vec!["support"]);
        assert_eq!(normalize("price/shipping"), Vec::<String>::new());
        assert_eq!(normalize("costs 3.5 dollars"), vec!["costs", "dollars"]);
    }

    #[test]
    fn comma_splits_words_unless_a_digit_follows() {
        assert_eq!(normalize("hi,order"), vec!["hi", "order"]);
        assert_eq!(normalize("refund,please"), vec!["refund", "please"]);
        assert_eq!(tokenize("3,000 items"), vec!["3,000", "items"]);
        assert_eq!(tokenize("re:refund at 10:30"), vec!["re", ":", "refund", "at", "10:30"]);
    }

    #[test]
    fn contractions_split_before_the_clitic() {
        assert_eq!(tokenize("don't"), vec!["do", "n't"]);
        assert_eq!(tokenize("can't"), vec!["ca", "n't"]);
        assert_eq!(tokenize("won't"), vec!["wo", "n't"]);
        assert_eq!(tokenize("she's"), vec!["she", "'s"]);
        assert_eq!(tokenize("we'll"), vec!["we", "'ll"]);
        assert_eq!(tokenize("cannot"), vec!["can", "not"]);
        assert_eq!(normalize("I can't log in"), vec!["ca", "log"]);
    }

    #[test]
    fn trailing_period_and_ellipsis_split_off() {
        assert_eq!(tokenize("order."), vec!["order", "."]);
        assert_eq!(tokenize("wait...what"), vec!["wait", "...", "what"]);
        assert_eq!(tokenize("e.g"), vec!["e.g"]);
    }

    #[test]
    fn standalone_punctuation_separates_words() {
        assert_eq!(normalize("order#123"), vec!["order", "123"]);
        assert_eq!(normalize("(refund)"), vec!["refund"]);
    }

    #[test]
    fn normalize_is_idempotent_on_its_output() {
        let once = normalize("Hi there! Could you TRACK my package, please?");
        let again = normalize(&once.join(" "));
        assert_eq!(once, again);
    }

    #[test]
    fn unicode_letters_count_as_alphanumeric() {
        assert_eq!(normalize("Café crème"), vec!["café", "crème"]);
    }
}
