use mailparse::MailHeaderMap;
use serde_json::Value;

/// What a notification shows about one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MailSummary {
    pub from: String,
    pub subject: String,
    pub snippet: String,
}

/// Summary of a Graph JSON message.
pub fn summarize_structured(message: &Value) -> MailSummary {
    let from = message
        .pointer("/from/emailAddress/name")
        .or_else(|| message.pointer("/from/emailAddress/address"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("(unknown)")
        .to_string();
    let subject = message
        .get("subject")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(no subject)")
        .to_string();
    let snippet = message
        .get("bodyPreview")
        .and_then(Value::as_str)
        .map(|s| normalize_snippet(s, 140))
        .unwrap_or_default();
    MailSummary {
        from,
        subject,
        snippet,
    }
}

/// Summary of a raw RFC 822 message, read from its headers and first text part.
pub fn summarize_raw(raw: &[u8]) -> MailSummary {
    let Ok(parsed) = mailparse::parse_mail(raw) else {
        return MailSummary {
            from: "(unknown)".to_string(),
            subject: "(no subject)".to_string(),
            snippet: normalize_snippet(&String::from_utf8_lossy(raw), 140),
        };
    };

    let header = |name: &str, fallback: &str| {
        parsed
            .headers
            .get_first_value(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    let snippet = first_text_part(&parsed)
        .map(|body| normalize_snippet(&body, 140))
        .unwrap_or_default();

    MailSummary {
        from: header("From", "(unknown)"),
        subject: header("Subject", "(no subject)"),
        snippet,
    }
}

fn first_text_part(p: &mailparse::ParsedMail) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
        return p.get_body().ok();
    }
    p.subparts.iter().find_map(first_text_part)
}

/// Collapse whitespace-only lines and cut to `max_chars`.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_summary_prefers_display_name() {
        let msg = json!({
            "subject": "Did you see last night's game?",
            "bodyPreview": "They were\r\n\r\nawesome!",
            "from": { "emailAddress": { "name": "Adele Vance", "address": "adelev@contoso.com" } }
        });
        let s = summarize_structured(&msg);
        assert_eq!(s.from, "Adele Vance");
        assert_eq!(s.subject, "Did you see last night's game?");
        assert_eq!(s.snippet, "They were awesome!");
    }

    #[test]
    fn structured_summary_falls_back() {
        let s = summarize_structured(&json!({ "id": "AAMk" }));
        assert_eq!(s.from, "(unknown)");
        assert_eq!(s.subject, "(no subject)");
        assert_eq!(s.snippet, "");
    }

    #[test]
    fn raw_summary_decodes_headers() {
        let raw = b"From: Adele <adelev@contoso.com>\r\nSubject: =?utf-8?q?Caf=C3=A9?=\r\nContent-Type: text/plain\r\n\r\nhello\r\nthere\r\n";
        let s = summarize_raw(raw);
        assert_eq!(s.from, "Adele <adelev@contoso.com>");
        assert_eq!(s.subject, "Café");
        assert_eq!(s.snippet, "hello there");
    }

    #[test]
    fn snippet_is_truncated() {
        assert_eq!(normalize_snippet("abcdef", 3), "abc");
    }
}
