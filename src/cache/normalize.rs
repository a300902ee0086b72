//! Query normalization for cache keys and fuzzy matching.
//!
//! A normalized query is the lower-cased, punctuation-free, stop-word-free
//! projection of the caller's text. Month names are folded to their
//! two-digit number, and a month next to a four-digit year becomes one
//! `YYYYmMM` token. Digit runs of 3+ characters stay where they are, and
//! their sorted set is appended after a ` | ` delimiter as the suffix tag:
//!
//! ```text
//! "Vendas do produto 369946 em 2026-01"  -> "vendas produto 369946 2026m01 | 2026 369946"
//! "vendas produto 369946 janeiro 2026"   -> "vendas produto 369946 2026m01 | 2026 369946"
//! ```
//!
//! The ordered digit runs are the critical-number sequence. Two queries
//! whose sequences differ are never cache-equivalent, however similar the
//! rest is, and that includes the same numbers in swapped roles.
//!
//! The output is a fixed point of the transformation, i.e.
//! `normalize(normalize(q)) == normalize(q)`. A trailing tag that matches
//! the text before it is recognised and rebuilt rather than folded into
//! the body.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]|_").expect("valid regex"));

static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{3,}").expect("valid regex"));

/// Separates the body from the suffix tag.
pub const TAG_DELIMITER: &str = " | ";

/// Words carrying no meaning for a BI question, Portuguese and English.
const STOP_WORDS: &[&str] = &[
    // pt
    "a", "o", "as", "os", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em",
    "no", "na", "nos", "nas", "por", "pelo", "pela", "para", "pra", "com", "e", "ou", "que",
    "qual", "quais", "quanto", "quantos", "quanta", "quantas", "foi", "foram", "sao", "são",
    "é", "me", "mostre", "mostrar", "ao", "aos",
    // en
    "the", "an", "of", "in", "on", "at", "for", "to", "and", "or", "by", "with", "what",
    "which", "how", "much", "many", "was", "were", "is", "are", "show", "me", "please",
];

/// Month names folded to their number. Abbreviations that are also
/// common words ("set", "out", "may", "mar") are left out.
#[rustfmt::skip]
const MONTHS: &[(&str, &str)] = &[
    ("janeiro", "01"), ("january", "01"), ("jan", "01"),
    ("fevereiro", "02"), ("february", "02"), ("fev", "02"), ("feb", "02"),
    ("março", "03"), ("marco", "03"), ("march", "03"),
    ("abril", "04"), ("april", "04"), ("abr", "04"), ("apr", "04"),
    ("maio", "05"),
    ("junho", "06"), ("june", "06"), ("jun", "06"),
    ("julho", "07"), ("july", "07"), ("jul", "07"),
    ("agosto", "08"), ("august", "08"), ("ago", "08"), ("aug", "08"),
    ("setembro", "09"), ("september", "09"), ("sep", "09"),
    ("outubro", "10"), ("october", "10"), ("oct", "10"),
    ("novembro", "11"), ("november", "11"), ("nov", "11"),
    ("dezembro", "12"), ("december", "12"), ("dez", "12"), ("dec", "12"),
];

/// A normalized query plus its critical-number sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    text: String,
    numbers: Vec<String>,
}

impl NormalizedQuery {
    /// The normalized text (body words, then the suffix tag if any).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Digit runs of 3+ characters, in the order they appear.
    pub fn numbers(&self) -> &[String] {
        &self.numbers
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Normalize a caller's query text.
pub fn normalize(query: &str) -> NormalizedQuery {
    let lowered = query.to_lowercase();
    let spaced = NON_WORD.replace_all(strip_tag(&lowered), " ");

    let mut words: Vec<&str> = Vec::new();
    for word in spaced.split_whitespace() {
        if STOP_WORDS.contains(&word) {
            continue;
        }
        words.push(month_number(word).unwrap_or(word));
    }
    let mut text = fuse_dates(&words).join(" ");

    let numbers = digit_runs(&text);
    let tag = suffix_tag(&numbers);
    if !tag.is_empty() {
        text.push_str(TAG_DELIMITER);
        text.push_str(&tag);
    }
    NormalizedQuery { text, numbers }
}

/// Extract the critical-number sequence from any text, raw or normalized.
///
/// A trailing suffix tag is ignored, so a normalized query yields the same
/// sequence as the text it came from.
pub fn numeric_tokens(text: &str) -> Vec<String> {
    digit_runs(strip_tag(text))
}

fn digit_runs(text: &str) -> Vec<String> {
    NUMERIC_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// The sorted, de-duplicated numbers, space separated.
fn suffix_tag(numbers: &[String]) -> String {
    let set: BTreeSet<&str> = numbers.iter().map(String::as_str).collect();
    set.into_iter().collect::<Vec<_>>().join(" ")
}

/// Drop a trailing tag, but only one that agrees with the body before it.
fn strip_tag(text: &str) -> &str {
    match text.rsplit_once(TAG_DELIMITER) {
        Some((body, tag)) if tag == suffix_tag(&digit_runs(body)) => body,
        _ => text,
    }
}

/// Merge adjacent month and year tokens, in either order, into `YYYYmMM`.
fn fuse_dates<'a>(words: &[&'a str]) -> Vec<std::borrow::Cow<'a, str>> {
    let mut out = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let pair = words.get(i + 1).and_then(|next| {
            match (as_year(words[i]), as_month(next)) {
                (Some(year), Some(month)) => Some((year, month)),
                _ => as_year(next).zip(as_month(words[i])),
            }
        });
        match pair {
            Some((year, month)) => {
                out.push(format!("{year}m{month:02}").into());
                i += 2;
            }
            None => {
                out.push(words[i].into());
                i += 1;
            }
        }
    }
    out
}

fn as_year(word: &str) -> Option<&str> {
    let is_year = word.len() == 4
        && word.bytes().all(|b| b.is_ascii_digit())
        && (word.starts_with("19") || word.starts_with("20"));
    is_year.then_some(word)
}

fn as_month(word: &str) -> Option<u8> {
    if word.is_empty() || word.len() > 2 || !word.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    word.parse().ok().filter(|m| (1..=12).contains(m))
}

fn month_number(word: &str) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_case_punctuation_and_whitespace() {
        let n = normalize("  Sales   for Product X?!  ");
        assert_eq!(n.as_str(), "sales product x");
    }

    #[test]
    fn paraphrases_converge() {
        assert_eq!(
            normalize("what were sales for product X").as_str(),
            normalize("sales for product X?").as_str()
        );
    }

    #[test]
    fn numbers_stay_in_place_and_tag_is_sorted() {
        let n = normalize("Vendas do produto 369946 em 2026-01");
        assert_eq!(n.as_str(), "vendas produto 369946 2026m01 | 2026 369946");
        assert_eq!(n.numbers(), ["369946", "2026"]);
    }

    #[test]
    fn month_names_fold_to_numbers() {
        assert_eq!(
            normalize("vendas produto 369946 janeiro 2026").as_str(),
            normalize("Vendas do produto 369946 em 2026-01").as_str()
        );
        assert_eq!(
            normalize("vendas 01/2026").as_str(),
            normalize("vendas 2026-1").as_str()
        );
    }

    #[test]
    fn swapped_identifiers_stay_distinct() {
        let a = normalize("estoque transferido da loja 123 para loja 456");
        let b = normalize("estoque transferido da loja 456 para loja 123");
        assert_ne!(a.as_str(), b.as_str());
        assert_ne!(a.numbers(), b.numbers());
    }

    #[test]
    fn short_numbers_are_not_critical() {
        let n = normalize("top 10 lojas");
        assert!(n.numbers().is_empty());
        assert_eq!(n.as_str(), "top 10 lojas");
    }

    #[test]
    fn embedded_digit_runs_are_critical() {
        let n = normalize("estoque sku-4471 deposito WH123");
        assert_eq!(n.numbers(), ["4471", "123"]);
    }

    #[test]
    fn pipe_in_raw_text_is_not_a_tag() {
        let n = normalize("vendas | produto 555");
        assert_eq!(n.as_str(), "vendas produto 555 | 555");
    }

    #[test]
    fn idempotent() {
        for q in [
            "Vendas do produto 369946 em 2026-01",
            "estoque sku-4471 deposito WH123 e 4471",
            "What were the sales in March 2025 for store 00042?",
            "  já   foi   ÓTIMO!!  ",
            "",
            "123 456 123",
            "03 01 2026 2027",
            "a | b | 555",
            "x 555 | 555",
        ] {
            let once = normalize(q);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {q:?}");
        }
    }

    #[test]
    fn numeric_tokens_of_normalized_text_match() {
        let n = normalize("pedido 98765 loja 321");
        assert_eq!(numeric_tokens(n.as_str()), n.numbers());
        assert_eq!(numeric_tokens("pedido 98765 loja 321"), n.numbers());
    }
}
