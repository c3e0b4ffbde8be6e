//! Predicates over post-navigation page state

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::PageDriver;
use crate::error::AcceptanceResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assertion {
    UrlContains(String),
    UrlExcludes(String),
    ElementCountAtLeast { selector: String, min: usize },
    TitleNonEmpty,
}

impl Assertion {
    pub fn url_contains(fragment: impl Into<String>) -> Self {
        Assertion::UrlContains(fragment.into())
    }

    pub fn url_excludes(fragment: impl Into<String>) -> Self {
        Assertion::UrlExcludes(fragment.into())
    }

    pub fn element_count_at_least(selector: impl Into<String>, min: usize) -> Self {
        Assertion::ElementCountAtLeast {
            selector: selector.into(),
            min,
        }
    }

    /// Evaluate against the live page.
    ///
    /// `Ok` carries the verdict. Non-fatal driver errors become
    /// [`Verdict::Fault`]; only a fatal transport error is returned as `Err`.
    pub async fn evaluate<D>(&self, driver: &mut D) -> AcceptanceResult<Verdict>
    where
        D: PageDriver + ?Sized,
    {
        let outcome = match self {
            Assertion::UrlContains(fragment) => driver.current_url().await.map(|url| {
                if url.contains(fragment.as_str()) {
                    Verdict::Pass(format!("URL {} contains {}", url, fragment))
                } else {
                    Verdict::Fail(format!("URL {} does not contain {}", url, fragment))
                }
            }),
            Assertion::UrlExcludes(fragment) => driver.current_url().await.map(|url| {
                if url.contains(fragment.as_str()) {
                    Verdict::Fail(format!("URL {} contains {}", url, fragment))
                } else {
                    Verdict::Pass(format!("URL {} avoids {}", url, fragment))
                }
            }),
            Assertion::ElementCountAtLeast { selector, min } => {
                driver.query_all(selector).await.map(|elements| {
                    let found = elements.len();
                    if found >= *min {
                        Verdict::Pass(format!("found {} '{}' (need {})", found, selector, min))
                    } else {
                        Verdict::Fail(format!("found {} '{}', expected at least {}", found, selector, min))
                    }
                })
            }
            Assertion::TitleNonEmpty => driver.title().await.map(|title| {
                if title.trim().is_empty() {
                    Verdict::Fail("page title is empty".to_string())
                } else {
                    Verdict::Pass(format!("title '{}'", title.trim()))
                }
            }),
        };

        match outcome {
            Ok(verdict) => Ok(verdict),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(Verdict::Fault(e.to_string())),
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::UrlContains(s) => write!(f, "url contains '{}'", s),
            Assertion::UrlExcludes(s) => write!(f, "url excludes '{}'", s),
            Assertion::ElementCountAtLeast { selector, min } => {
                write!(f, "at least {} × '{}'", min, selector)
            }
            Assertion::TitleNonEmpty => f.write_str("title non-empty"),
        }
    }
}

/// An assertion plus whether its failure only warns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    #[serde(rename = "assert")]
    pub assertion: Assertion,

    #[serde(default)]
    pub optional: bool,
}

impl Check {
    pub fn required(assertion: Assertion) -> Self {
        Self {
            assertion,
            optional: false,
        }
    }

    pub fn optional(assertion: Assertion) -> Self {
        Self {
            assertion,
            optional: true,
        }
    }
}

/// Outcome of evaluating one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Pass(String),
    /// Evaluated and did not hold
    Fail(String),
    /// The predicate itself could not be evaluated
    Fault(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Verdict::Pass(d) | Verdict::Fail(d) | Verdict::Fault(d) => d,
        }
    }
}

/// Recorded result of one check within a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub assertion: String,
    pub optional: bool,
    pub verdict: Verdict,
}
