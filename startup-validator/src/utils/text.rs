//! Text helpers for prompts, search snippets and scraped pages.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "their", "they", "them", "your",
    "you", "our", "are", "was", "were", "will", "can", "has", "have", "had", "not", "but", "who",
    "what", "when", "where", "which", "while", "also", "than", "then", "its", "via", "each",
    "more", "most", "less", "all", "any", "about", "over", "such", "using", "use", "based", "app",
    "name", "description", "target", "audience", "category", "problem", "solution", "revenue",
    "model", "notes", "provides", "provide", "helps", "help", "make", "makes", "new", "way",
];

fn word_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z][a-z0-9\-]{2,}").ok()).as_ref()
}

fn money_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\s?(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(trillion|billion|million|thousand|tn|bn|mm|[tbmk])?\b").ok()
    })
    .as_ref()
}

fn growth_suffix_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s?%\s*(?:cagr|growth|annual|annually|yoy|year[- ]over[- ]year|per year|a year)").ok()
    })
    .as_ref()
}

fn growth_prefix_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:cagr|grow(?:th|ing|s)?)\s+(?:rate\s+)?(?:of|at|by)?\s*(-?\d+(?:\.\d+)?)\s?%").ok()
    })
    .as_ref()
}

/// The most frequent non-stopword terms in `text`, first occurrence breaking ties.
#[must_use]
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let Some(re) = word_re() else {
        return Vec::new();
    };
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, m) in re.find_iter(&lowered).enumerate() {
        let word = m.as_str().trim_matches('-');
        if word.len() < 3 || STOPWORDS.contains(&word) {
            continue;
        }
        let entry = counts.entry(word).or_insert((0, position));
        entry.0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Dollar amounts mentioned in `text`, scaled to plain USD.
#[must_use]
pub fn parse_money_amounts(text: &str) -> Vec<f64> {
    let Some(re) = money_re() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let multiplier = match caps
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .as_deref()
            {
                Some("trillion" | "tn" | "t") => 1e12,
                Some("billion" | "bn" | "b") => 1e9,
                Some("million" | "mm" | "m") => 1e6,
                Some("thousand" | "k") => 1e3,
                _ => 1.0,
            };
            Some(number * multiplier)
        })
        .collect()
}

/// Growth percentages mentioned in `text` ("12% CAGR", "growing at 8%").
#[must_use]
pub fn parse_growth_rates(text: &str) -> Vec<f64> {
    let mut rates = Vec::new();
    for re in [growth_suffix_re(), growth_prefix_re()].into_iter().flatten() {
        for caps in re.captures_iter(text) {
            if let Some(rate) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                rates.push(rate);
            }
        }
    }
    rates
}

/// Splits a comma or semicolon separated list, dropping blanks.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(|item| item.trim().trim_matches(|c| c == '[' || c == ']').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Whether `text` contains any of `needles` (case-insensitive).
#[must_use]
pub fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    needles.iter().any(|needle| lowered.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_by_frequency() {
        let words = keywords(
            "Meal kits for busy parents. Healthy meal kits delivered from local farms.",
            3,
        );
        assert_eq!(words, vec!["meal", "kits", "busy"]);
    }

    #[test]
    fn test_keywords_skip_stopwords() {
        assert!(keywords("the and for with", 5).is_empty());
    }

    #[test]
    fn test_parse_money_amounts() {
        let amounts = parse_money_amounts("valued at $4.5 billion in 2023, up from $900M and $1,200");
        assert_eq!(amounts, vec![4.5e9, 9e8, 1200.0]);
    }

    #[test]
    fn test_parse_growth_rates() {
        let rates = parse_growth_rates("expected 12.5% CAGR through 2030; segment growing at 8% yearly");
        assert!(rates.contains(&12.5));
        assert!(rates.contains(&8.0));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("[Busy parents], urban; , professionals"),
            vec!["Busy parents", "urban", "professionals"]
        );
    }

    #[test]
    fn test_contains_any() {
        assert!(contains_any("A Mobile App", &["mobile"]));
        assert!(!contains_any("web platform", &["mobile", "ios"]));
    }
}
