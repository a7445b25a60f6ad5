//! StatsD line protocol parser
//!
//! ```text
//! <name>:<value>|<type>[|@<sample rate>]
//!
//! requests:1|c          counter
//! requests:1|c|@0.1     counter sampled at 10%, recorded as 10
//! queue.depth:42|g      gauge
//! db.query:12.5|ms      timer
//! users:1001|s          set
//! ```
//!
//! Delimiters are matched from the right, so a name may itself contain
//! `:` or `|`. Sample rates are accepted on counters only.

use thiserror::Error;

use super::metric::{StatsdMetric, StatsdType};

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsdParseError {
    /// Missing `:` or `|` delimiter
    #[error("invalid statsd format")]
    Malformed,

    /// Name, value or type is empty
    #[error("{0} is empty")]
    EmptyField(&'static str),

    /// Type token not one of c, g, s, ms
    #[error("invalid type '{0}'")]
    UnknownType(String),

    /// Value is not a finite number
    #[error("invalid value '{0}'")]
    InvalidValue(String),

    /// Sample rate is not a number
    #[error("invalid rate '{0}'")]
    InvalidRate(String),

    /// Sample rate outside (0, 1]
    #[error("rate {0} outside (0, 1]")]
    RateOutOfRange(f64),

    /// Sample rate on a gauge, timer or set
    #[error("rate is supported only for counters, not {0}")]
    RateNotSupported(StatsdType),
}

/// Parse one line
pub fn parse_line(line: &str) -> Result<StatsdMetric, StatsdParseError> {
    let (body, rate) = match line.rfind("|@") {
        Some(pos) => (&line[..pos], Some(&line[pos + 2..])),
        None => (line, None),
    };
    let rate = rate.filter(|r| !r.is_empty());

    let (head, type_token) = body.rsplit_once('|').ok_or(StatsdParseError::Malformed)?;
    let (name, value) = head.rsplit_once(':').ok_or(StatsdParseError::Malformed)?;

    if name.is_empty() {
        return Err(StatsdParseError::EmptyField("name"));
    }
    if value.is_empty() {
        return Err(StatsdParseError::EmptyField("value"));
    }
    if type_token.is_empty() {
        return Err(StatsdParseError::EmptyField("type"));
    }

    let kind = StatsdType::from_token(type_token)
        .ok_or_else(|| StatsdParseError::UnknownType(type_token.to_string()))?;

    let mut value: f64 = value
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| StatsdParseError::InvalidValue(value.to_string()))?;

    if let Some(rate) = rate {
        let rate: f64 = rate
            .parse()
            .map_err(|_| StatsdParseError::InvalidRate(rate.to_string()))?;
        if rate.is_nan() || rate <= 0.0 || rate > 1.0 {
            return Err(StatsdParseError::RateOutOfRange(rate));
        }
        if kind != StatsdType::Counter {
            return Err(StatsdParseError::RateNotSupported(kind));
        }
        value /= rate;
    }

    Ok(StatsdMetric::new(name, kind, value))
}

/// Parse a newline-separated message, skipping bad lines
pub fn parse(message: &str) -> Vec<StatsdMetric> {
    content_lines(message)
        .filter_map(|line| match parse_line(line) {
            Ok(metric) => Some(metric),
            Err(e) => {
                tracing::debug!(line, error = %e, "dropping statsd line");
                None
            }
        })
        .collect()
}

/// Lines of a message with any trailing `\r` removed, blank lines skipped
pub fn content_lines(message: &str) -> impl Iterator<Item = &str> {
    message
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(line: &str) -> StatsdMetric {
        parse_line(line).unwrap_or_else(|e| panic!("{line}: {e}"))
    }

    #[test]
    fn test_types() {
        assert_eq!(ok("a:1|c").kind(), StatsdType::Counter);
        assert_eq!(ok("a:1|g").kind(), StatsdType::Gauge);
        assert_eq!(ok("a:1|s").kind(), StatsdType::Set);
        assert_eq!(ok("a:1|ms").kind(), StatsdType::Timer);
        assert_eq!(ok("a:1|Ms").kind(), StatsdType::Timer);
    }

    #[test]
    fn test_fields() {
        let m = ok("api.latency:12.5|ms");
        assert_eq!(m.name(), "api.latency");
        assert_eq!(m.raw_value(), 12.5);
    }

    #[test]
    fn test_negative_value() {
        assert_eq!(ok("delta:-4|g").raw_value(), -4.0);
    }

    #[test]
    fn test_rightmost_delimiters() {
        let m = ok("host:port|x:7|g");
        assert_eq!(m.name(), "host:port|x");
        assert_eq!(m.raw_value(), 7.0);
    }

    #[test]
    fn test_sample_rate_divides_value() {
        let m = ok("requests:1|c|@0.1");
        assert_eq!(m.raw_value(), 10.0);

        let m = ok("requests:3|c|@1");
        assert_eq!(m.raw_value(), 3.0);
    }

    #[test]
    fn test_empty_rate_is_ignored() {
        assert_eq!(ok("requests:2|c|@").raw_value(), 2.0);
    }

    #[test]
    fn test_rate_out_of_range() {
        assert_eq!(
            parse_line("requests:1|c|@0"),
            Err(StatsdParseError::RateOutOfRange(0.0))
        );
        assert_eq!(
            parse_line("requests:1|c|@1.5"),
            Err(StatsdParseError::RateOutOfRange(1.5))
        );
        assert!(matches!(
            parse_line("requests:1|c|@-0.5"),
            Err(StatsdParseError::RateOutOfRange(_))
        ));
    }

    #[test]
    fn test_rate_only_for_counters() {
        assert_eq!(
            parse_line("latency:5|ms|@0.5"),
            Err(StatsdParseError::RateNotSupported(StatsdType::Timer))
        );
        assert_eq!(
            parse_line("temp:5|g|@0.5"),
            Err(StatsdParseError::RateNotSupported(StatsdType::Gauge))
        );
    }

    #[test]
    fn test_invalid_lines() {
        assert_eq!(parse_line(""), Err(StatsdParseError::Malformed));
        assert_eq!(parse_line("novalue"), Err(StatsdParseError::Malformed));
        assert_eq!(parse_line("a|c"), Err(StatsdParseError::Malformed));
        assert_eq!(parse_line(":1|c"), Err(StatsdParseError::EmptyField("name")));
        assert_eq!(parse_line("a:|c"), Err(StatsdParseError::EmptyField("value")));
        assert_eq!(parse_line("a:1|"), Err(StatsdParseError::EmptyField("type")));
        assert_eq!(
            parse_line("a:1|h"),
            Err(StatsdParseError::UnknownType("h".into()))
        );
        assert_eq!(
            parse_line("a:abc|c"),
            Err(StatsdParseError::InvalidValue("abc".into()))
        );
        assert_eq!(
            parse_line("a:inf|g"),
            Err(StatsdParseError::InvalidValue("inf".into()))
        );
        assert_eq!(
            parse_line("a:1|c|@x"),
            Err(StatsdParseError::InvalidRate("x".into()))
        );
    }

    #[test]
    fn test_parse_multiline() {
        let metrics = parse("a:1|c\r\nbad line\nb:2|g\n\nc:3|ms");
        let names: Vec<_> = metrics.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_empty_message() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
    }

    #[test]
    fn test_content_lines_skip_blanks() {
        let lines: Vec<_> = content_lines("a:1|c\r\n\n  \r\nb:2|g\n").collect();
        assert_eq!(lines, vec!["a:1|c", "b:2|g"]);
    }
}
