//! Minimal PromQL selector parsing for the query adapter.
//!
//! Handles instant-vector selectors of the form
//! `metric_name{label="value", other=~"re"}`. Anything beyond a plain
//! selector is rejected with a query error; expression evaluation beyond
//! selection is out of scope for this bridge.

use crate::error::{Error, Result};
use crate::model::{MatchOp, Matcher};
use crate::schema::NAME_LABEL;

use regex::Regex;

const SELECTOR_PATTERN: &str = r"^([a-zA-Z_:][a-zA-Z0-9_:]*)\s*(?:\{([^}]*)\})?$";
const MATCHER_PATTERN: &str = r#"([a-zA-Z_][a-zA-Z0-9_]*)\s*(=~|!~|!=|=)\s*"([^"]*)""#;

/// Parse a selector expression into its matcher list.
///
/// The metric name becomes an equality matcher on `__name__`, so the
/// translator routes it to the metric-name column like any other matcher.
pub fn parse_selector(expr: &str) -> Result<Vec<Matcher>> {
    let expr = expr.trim();
    let selector_re = Regex::new(SELECTOR_PATTERN)
        .map_err(|e| Error::Internal(format!("selector pattern: {e}")))?;

    let captures = selector_re.captures(expr).ok_or_else(|| {
        Error::Query(format!(
            "unsupported expression '{expr}': only plain selectors are accepted"
        ))
    })?;

    let metric_name = captures
        .get(1)
        .map(|m| m.as_str())
        .ok_or_else(|| Error::Query(format!("no metric name in '{expr}'")))?;

    let mut matchers = vec![Matcher::equal(NAME_LABEL, metric_name)];
    if let Some(label_block) = captures.get(2) {
        matchers.extend(parse_matchers(label_block.as_str())?);
    }

    Ok(matchers)
}

fn parse_matchers(block: &str) -> Result<Vec<Matcher>> {
    let matcher_re = Regex::new(MATCHER_PATTERN)
        .map_err(|e| Error::Internal(format!("matcher pattern: {e}")))?;

    let mut matchers = Vec::new();
    for caps in matcher_re.captures_iter(block) {
        let (Some(name), Some(op), Some(value)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            continue;
        };

        let op = match op.as_str() {
            "=" => MatchOp::Equal,
            "!=" => MatchOp::NotEqual,
            "=~" => MatchOp::Regex,
            "!~" => MatchOp::NotRegex,
            other => {
                return Err(Error::Query(format!("unknown matcher operator '{other}'")));
            }
        };

        matchers.push(Matcher::new(name.as_str(), op, value.as_str()));
    }

    if matchers.is_empty() && !block.trim().is_empty() {
        return Err(Error::Query(format!("could not parse matchers '{block}'")));
    }

    Ok(matchers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_metric_name() {
        let matchers = parse_selector("cpu_usage").unwrap();
        assert_eq!(matchers.len(), 1);
        assert_eq!(matchers[0].name, NAME_LABEL);
        assert_eq!(matchers[0].value, "cpu_usage");
        assert_eq!(matchers[0].op, MatchOp::Equal);
    }

    #[test]
    fn selector_with_matchers() {
        let matchers = parse_selector(r#"cpu{host="a", env!~"stag.*"}"#).unwrap();
        assert_eq!(matchers.len(), 3);
        assert_eq!(matchers[1].name, "host");
        assert_eq!(matchers[1].op, MatchOp::Equal);
        assert_eq!(matchers[2].name, "env");
        assert_eq!(matchers[2].op, MatchOp::NotRegex);
        assert_eq!(matchers[2].value, "stag.*");
    }

    #[test]
    fn empty_label_block_is_fine() {
        let matchers = parse_selector("cpu{}").unwrap();
        assert_eq!(matchers.len(), 1);
    }

    #[test]
    fn rejects_non_selector_expressions() {
        assert!(matches!(
            parse_selector("rate(cpu[5m])"),
            Err(Error::Query(_))
        ));
        assert!(matches!(parse_selector(""), Err(Error::Query(_))));
    }

    #[test]
    fn rejects_garbage_matchers() {
        assert!(matches!(
            parse_selector("cpu{host}"),
            Err(Error::Query(_))
        ));
    }
}
