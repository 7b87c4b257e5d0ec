//! JUnit test report summary.

use crate::outcome::Outcome;
use crate::printer;
use console::style;
use serde::Deserialize;
use std::path::Path;
use testbed_core::{Error, Result};

/// Root of a report: either `<testsuites>` holding suites or a single
/// `<testsuite>` holding cases. The root element name is not checked.
#[derive(Debug, Default, Deserialize)]
struct Report {
    #[serde(rename = "testsuite", default)]
    suites: Vec<Suite>,
    #[serde(rename = "testcase", default)]
    cases: Vec<Case>,
}

#[derive(Debug, Default, Deserialize)]
struct Suite {
    #[serde(rename = "testcase", default)]
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct Case {
    #[serde(rename = "@name")]
    name: String,
    #[serde(default)]
    failure: Vec<Detail>,
    #[serde(default)]
    error: Vec<Detail>,
    #[serde(default)]
    skipped: Vec<Detail>,
}

#[derive(Debug, Deserialize)]
struct Detail {
    #[serde(rename = "@message")]
    _message: Option<String>,
    #[serde(rename = "$text")]
    _text: Option<String>,
}

/// Counters of a parsed report plus the names of failed cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
    /// Cases with a failure or an error, in report order, without repeats.
    pub failed_cases: Vec<String>,
}

impl ReportSummary {
    pub fn succeeded(&self) -> usize {
        self.tests
            .saturating_sub(self.failures + self.errors + self.skipped)
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_exit(self.is_success())
    }

    pub fn print(&self) {
        let heading = |s: &str| {
            if self.is_success() {
                style(s.to_string()).green()
            } else {
                style(s.to_string()).red().bold()
            }
        };
        println!("{}", heading("Test summary"));
        println!("{}", heading("------------"));

        let line = format!("succeeded: {}/{}", self.succeeded(), self.tests);
        if self.is_success() {
            printer::ok(&line);
        } else {
            println!("{line}");
        }
        if self.skipped > 0 {
            printer::skip(&format!("skipped:   {}", self.skipped));
        }
        if self.failures > 0 {
            printer::error(&format!("failures:  {}", self.failures));
        }
        if self.errors > 0 {
            printer::error(&format!("errors:    {}", self.errors));
        }
        println!();
    }
}

/// Parse a JUnit XML document.
pub fn parse_report(xml: &str) -> Result<ReportSummary> {
    let report: Report =
        quick_xml::de::from_str(xml).map_err(|e| Error::Report(format!("invalid JUnit XML: {e}")))?;

    let cases = report
        .cases
        .iter()
        .chain(report.suites.iter().flat_map(|s| s.cases.iter()));

    let mut summary = ReportSummary::default();
    for case in cases {
        summary.tests += 1;
        let failed = !case.failure.is_empty();
        let errored = !case.error.is_empty();
        if failed {
            summary.failures += 1;
        }
        if errored {
            summary.errors += 1;
        }
        if !case.skipped.is_empty() {
            summary.skipped += 1;
        }
        if (failed || errored) && !summary.failed_cases.contains(&case.name) {
            summary.failed_cases.push(case.name.clone());
        }
    }
    Ok(summary)
}

/// Read, parse and print the report at `path`.
pub fn summarise_report(path: &Path) -> Result<ReportSummary> {
    let xml = std::fs::read_to_string(path)?;
    let summary = parse_report(&xml)?;
    summary.print();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_suite_report() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite>
  <testcase classname="sel4test" name="SYSCALL0000"/>
  <testcase classname="sel4test" name="SYSCALL0001">
    <failure type="failure">Assertion failed</failure>
  </testcase>
  <testcase classname="sel4test" name="BIND0001">
    <skipped/>
  </testcase>
</testsuite>"#;

        let summary = parse_report(xml).unwrap();
        assert_eq!(
            summary,
            ReportSummary {
                tests: 3,
                failures: 1,
                errors: 0,
                skipped: 1,
                failed_cases: vec!["SYSCALL0001".to_string()],
            }
        );
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.outcome(), Outcome::Failure);
    }

    #[test]
    fn test_nested_suites_report() {
        let xml = r#"<testsuites>
  <testsuite name="a">
    <testcase name="one"/>
    <testcase name="two"><error message="crashed"/></testcase>
  </testsuite>
  <testsuite name="b">
    <testcase name="three"/>
  </testsuite>
</testsuites>"#;

        let summary = parse_report(xml).unwrap();
        assert_eq!(summary.tests, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failed_cases, vec!["two".to_string()]);
    }

    #[test]
    fn test_clean_report_succeeds() {
        let summary = parse_report("<testsuite><testcase name=\"x\"/></testsuite>").unwrap();
        assert_eq!(summary.outcome(), Outcome::Success);
    }

    #[test]
    fn test_garbage_is_report_error() {
        assert!(matches!(parse_report("<testsuite><testcase"), Err(Error::Report(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = summarise_report(&dir.path().join("parsed_results.xml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
