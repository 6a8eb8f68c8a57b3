//! Code extraction from message text.
//!
//! This module provides the [`Matcher`] trait and two implementations:
//! [`OtpMatcher`] for fixed-length numeric codes (the default, six digits) and
//! [`RegexMatcher`] for anything else.
//!
//! # Example
//!
//! ```
//! use imap_otp::matcher::{Matcher, OtpMatcher, RegexMatcher};
//!
//! let otp = OtpMatcher::six_digit();
//! assert_eq!(otp.find_match("Your code is 845213 today").as_deref(), Some("845213"));
//!
//! let custom = RegexMatcher::new(r"PIN-([A-Z0-9]{4})").unwrap();
//! assert_eq!(custom.find_match("use PIN-X7Q2 to log in").as_deref(), Some("X7Q2"));
//! ```

use regex::Regex;
use std::borrow::Cow;

/// Trait for extracting a value from the text of a fetched message.
///
/// Implementations must be pure: the same text always yields the same result.
pub trait Matcher: Send + Sync {
    /// Returns the first match in `text`, or `None`.
    ///
    /// Uses `Cow<str>` so matches can be borrowed straight from the input.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use imap_otp::matcher::{Matcher, RegexMatcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The pattern must contain at least one capture group; the first one is
    /// returned as the match.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_description(pattern, format!("regex pattern: {pattern}"))
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: description.into(),
            regex,
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for numeric one-time codes of a fixed length.
///
/// A code is a run of exactly N ASCII digits with a non-digit (or the start or
/// end of the text) on each side. Longer digit runs never match, not even in
/// part. The leftmost qualifying run wins.
///
/// # Example
///
/// ```
/// use imap_otp::matcher::{Matcher, OtpMatcher};
///
/// let otp = OtpMatcher::six_digit();
/// assert_eq!(otp.find_match("Code: 123456."), Some("123456".into()));
/// assert_eq!(otp.find_match("Order 1234567"), None);
/// ```
#[derive(Debug, Clone)]
pub struct OtpMatcher {
    inner: RegexMatcher,
}

impl OtpMatcher {
    /// Creates a matcher for 6-digit codes.
    #[must_use]
    pub fn six_digit() -> Self {
        Self::n_digit(6)
    }

    /// Creates a matcher for N-digit codes.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn n_digit(digits: usize) -> Self {
        assert!(digits > 0, "digits must be > 0");
        // `\d` would also accept non-ASCII digits, so spell the class out.
        let pattern = format!(r"(?:^|[^0-9])([0-9]{{{digits}}})(?:[^0-9]|$)");
        Self {
            inner: RegexMatcher::with_description(&pattern, format!("{digits}-digit code"))
                .expect("valid regex"),
        }
    }
}

impl Default for OtpMatcher {
    fn default() -> Self {
        Self::six_digit()
    }
}

impl Matcher for OtpMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}
