//! Sliding-window combination generator
//!
//! Produces the consecutive n-grams ("graphemes") of a character sequence or a
//! numeric sequence. Windows advance one element at a time, so content of
//! length `L` yields exactly `L - W + 1` windows of size `W`.

use crate::error::{FluxError, Result};
use std::fmt;
use std::str::FromStr;

/// Largest supported window
pub const MAX_WINDOW: usize = 3;

/// Kind of combination requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationKind {
    /// Joined substrings
    Text,
    /// Numeric tuples
    Number,
}

impl FromStr for CombinationKind {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(CombinationKind::Text),
            "number" | "numeric" => Ok(CombinationKind::Number),
            _ => Err(FluxError::InvalidKind(s.to_string())),
        }
    }
}

impl fmt::Display for CombinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationKind::Text => f.write_str("text"),
            CombinationKind::Number => f.write_str("number"),
        }
    }
}

/// Content handed to [`combinations`]
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Text(&'a str),
    Number(&'a [f64]),
}

impl Content<'_> {
    fn kind(&self) -> CombinationKind {
        match self {
            Content::Text(_) => CombinationKind::Text,
            Content::Number(_) => CombinationKind::Number,
        }
    }
}

/// Windows produced by [`combinations`]
#[derive(Debug, Clone, PartialEq)]
pub enum Combinations {
    Text(Vec<String>),
    Number(Vec<Vec<f64>>),
}

impl Combinations {
    pub fn len(&self) -> usize {
        match self {
            Combinations::Text(windows) => windows.len(),
            Combinations::Number(windows) => windows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate the windows of `content`.
///
/// `kind` must agree with the content variant; a mismatch is reported as
/// [`FluxError::InvalidKind`].
pub fn combinations(content: Content<'_>, window: usize, kind: CombinationKind) -> Result<Combinations> {
    if content.kind() != kind {
        return Err(FluxError::InvalidKind(format!(
            "{} combinations requested for {} content",
            kind,
            content.kind()
        )));
    }
    match content {
        Content::Text(text) => text_combinations(text, window).map(Combinations::Text),
        Content::Number(values) => numeric_combinations(values, window).map(Combinations::Number),
    }
}

/// Character n-grams of `text`
pub fn text_combinations(text: &str, window: usize) -> Result<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    check_window(chars.len(), window)?;
    Ok(chars.windows(window).map(|w| w.iter().collect()).collect())
}

/// Numeric n-grams of `values`
pub fn numeric_combinations<T: Copy>(values: &[T], window: usize) -> Result<Vec<Vec<T>>> {
    check_window(values.len(), window)?;
    Ok(values.windows(window).map(<[T]>::to_vec).collect())
}

fn check_window(len: usize, window: usize) -> Result<()> {
    if len == 0 {
        return Err(FluxError::EmptyInput);
    }
    if window == 0 || window > MAX_WINDOW {
        return Err(FluxError::UnsupportedWindowSize(window));
    }
    if window > len {
        return Err(FluxError::WindowTooLarge { window, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_text_digraphs_and_trigraphs() {
        assert_eq!(text_combinations("hello", 2).unwrap(), vec!["he", "el", "ll", "lo"]);
        assert_eq!(text_combinations("hello", 3).unwrap(), vec!["hel", "ell", "llo"]);
    }

    #[test]
    fn test_window_one_returns_each_element() {
        assert_eq!(text_combinations("abc", 1).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            numeric_combinations(&[4u64, 5, 6], 1).unwrap(),
            vec![vec![4], vec![5], vec![6]]
        );
    }

    #[test]
    fn test_window_equal_to_length_is_single_window() {
        assert_eq!(text_combinations("ab", 2).unwrap(), vec!["ab"]);
        assert_eq!(numeric_combinations(&[10.0, 20.0], 2).unwrap(), vec![vec![10.0, 20.0]]);
    }

    #[test]
    fn test_numeric_windows() {
        assert_eq!(
            numeric_combinations(&[1u64, 2, 3, 4], 3).unwrap(),
            vec![vec![1, 2, 3], vec![2, 3, 4]]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(text_combinations("", 2), Err(FluxError::EmptyInput)));
        assert!(matches!(
            numeric_combinations::<f64>(&[], 1),
            Err(FluxError::EmptyInput)
        ));
        assert!(matches!(
            text_combinations("abcd", 0),
            Err(FluxError::UnsupportedWindowSize(0))
        ));
        assert!(matches!(
            text_combinations("abcdef", 4),
            Err(FluxError::UnsupportedWindowSize(4))
        ));
        assert!(matches!(
            text_combinations("ab", 3),
            Err(FluxError::WindowTooLarge { window: 3, len: 2 })
        ));
    }

    #[test]
    fn test_dynamic_entry_point() {
        let text = combinations(Content::Text("abc"), 2, CombinationKind::Text).unwrap();
        assert_eq!(text, Combinations::Text(vec!["ab".to_string(), "bc".to_string()]));

        let numbers = combinations(Content::Number(&[1.0, 2.0, 3.0]), 2, CombinationKind::Number).unwrap();
        assert_eq!(numbers.len(), 2);
    }

    #[test]
    fn test_kind_mismatch_is_invalid_kind() {
        let result = combinations(Content::Text("abc"), 2, CombinationKind::Number);
        assert!(matches!(result, Err(FluxError::InvalidKind(_))));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("text".parse::<CombinationKind>().unwrap(), CombinationKind::Text);
        assert_eq!("Number".parse::<CombinationKind>().unwrap(), CombinationKind::Number);
        assert!(matches!(
            "phoneme".parse::<CombinationKind>(),
            Err(FluxError::InvalidKind(ref s)) if s == "phoneme"
        ));
    }

    #[test]
    fn test_multibyte_characters_count_as_one() {
        assert_eq!(text_combinations("é!x", 2).unwrap(), vec!["é!", "!x"]);
    }

    proptest! {
        #[test]
        fn prop_window_count(values in prop::collection::vec(0u64..1_000_000, 1..64), window in 1usize..=3) {
            prop_assume!(window <= values.len());
            let windows = numeric_combinations(&values, window).unwrap();
            prop_assert_eq!(windows.len(), values.len() - window + 1);
            prop_assert!(windows.iter().all(|w| w.len() == window));
        }

        #[test]
        fn prop_text_window_count(text in "[a-z ]{1,40}", window in 1usize..=3) {
            prop_assume!(window <= text.len());
            let windows = text_combinations(&text, window).unwrap();
            prop_assert_eq!(windows.len(), text.len() - window + 1);
            prop_assert!(windows.iter().all(|w| w.chars().count() == window));
            prop_assert_eq!(windows[0].clone(), text[..window].to_string());
        }
    }
}
