//! §4.1 — the space-delimited text frame codec.
//!
//! A frame is a sequence of space-separated fields. No field may contain a
//! space except the last, which — if introduced by a leading `:` on a
//! field — absorbs the remainder of the frame verbatim (the `:` is
//! stripped). `Y 42` decodes to `["Y", "42"]`; `E :not allowed here`
//! decodes to `["E", "not allowed here"]`.

/// Splits a single text frame into fields, honoring the trailing
/// `:`-prefixed argument convention.
pub fn decode(frame: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = frame;
    loop {
        match rest.find(' ') {
            None => {
                if !rest.is_empty() {
                    fields.push(rest.to_owned());
                }
                break;
            }
            Some(idx) => {
                let (field, remainder) = rest.split_at(idx);
                let remainder = &remainder[1..];
                if let Some(tail) = remainder.strip_prefix(':') {
                    if !field.is_empty() {
                        fields.push(field.to_owned());
                    }
                    fields.push(tail.to_owned());
                    break;
                }
                if !field.is_empty() {
                    fields.push(field.to_owned());
                }
                rest = remainder;
            }
        }
    }
    fields
}

/// Joins fields into a single text frame, quoting the last field with a
/// leading `:` whenever it contains a space or is empty (so the decoder
/// can round-trip it).
pub fn encode(fields: &[&str]) -> String {
    match fields.split_last() {
        None => String::new(),
        Some((last, head)) => {
            let mut out = String::new();
            for field in head {
                out.push_str(field);
                out.push(' ');
            }
            if last.contains(' ') || last.is_empty() {
                out.push(':');
            }
            out.push_str(last);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_command() {
        assert_eq!(decode("Y 42"), vec!["Y".to_owned(), "42".to_owned()]);
    }

    #[test]
    fn decodes_trailing_colon_argument() {
        assert_eq!(
            decode("E :not allowed here"),
            vec!["E".to_owned(), "not allowed here".to_owned()]
        );
    }

    #[test]
    fn decodes_bare_command_with_no_args() {
        assert_eq!(decode("HELLO"), vec!["HELLO".to_owned()]);
    }

    #[test]
    fn colon_argument_absorbs_remaining_spaces() {
        assert_eq!(
            decode("RC :Cannot confirm choices: You chose 1 out of required 2 of type Sport"),
            vec![
                "RC".to_owned(),
                "Cannot confirm choices: You chose 1 out of required 2 of type Sport".to_owned(),
            ]
        );
    }

    #[test]
    fn colon_only_valid_immediately_after_a_space() {
        // A ':' that isn't the first character after a space is literal.
        assert_eq!(
            decode("M 42 7:30"),
            vec!["M".to_owned(), "42".to_owned(), "7:30".to_owned()]
        );
    }

    #[test]
    fn encode_quotes_trailing_argument_with_spaces() {
        assert_eq!(encode(&["E", "not allowed here"]), "E :not allowed here");
    }

    #[test]
    fn encode_does_not_quote_trailing_argument_without_spaces() {
        assert_eq!(encode(&["Y", "42"]), "Y 42");
    }

    #[test]
    fn encode_quotes_empty_trailing_argument() {
        assert_eq!(encode(&["HI", ""]), "HI :");
    }

    #[test]
    fn round_trips_normalized_frames() {
        for frame in ["Y 42", "E :not allowed here", "HELLO", "HI :1,2,3"] {
            let fields = decode(frame);
            let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
            assert_eq!(encode(&refs), frame);
        }
    }
}
