//! Payload rendering for the SSE wire.
//!
//! Both modes guarantee single-line output. SSE `data:` fields cannot carry
//! raw newlines without splitting into multi-line frames, and the frame
//! writer rejects payloads containing them outright.

use std::fmt;
use std::str::FromStr;

/// How event payloads are rendered before they hit the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPolicy {
    /// HTML-escape the payload and rewrite whitespace into markup, for pages
    /// that inject each fragment straight into the DOM.
    #[default]
    EscapedHtml,

    /// Wrap the raw payload in a one-field JSON object, for clients that do
    /// their own presentation.
    JsonWrapped,
}

impl RenderPolicy {
    pub fn render(&self, payload: &str) -> String {
        match self {
            RenderPolicy::EscapedHtml => escape_for_page(payload),
            RenderPolicy::JsonWrapped => {
                serde_json::json!({ "content": payload }).to_string()
            }
        }
    }
}

/// Escape markup characters, then rewrite whitespace: line breaks become
/// `</br>`, tabs become four non-breaking spaces, spaces become `&nbsp;`.
/// `\r\n` collapses to a single break so Windows-style text does not double
/// up.
fn escape_for_page(payload: &str) -> String {
    html_escape::encode_safe(payload)
        .replace("\r\n", "</br>")
        .replace(['\n', '\r'], "</br>")
        .replace('\t', "&nbsp;&nbsp;&nbsp;&nbsp;")
        .replace(' ', "&nbsp;")
}

impl fmt::Display for RenderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderPolicy::EscapedHtml => write!(f, "html"),
            RenderPolicy::JsonWrapped => write!(f, "json"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("render policy must be `html` or `json`")]
pub struct ParseRenderPolicyError;

impl FromStr for RenderPolicy {
    type Err = ParseRenderPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(RenderPolicy::EscapedHtml),
            "json" => Ok(RenderPolicy::JsonWrapped),
            _ => Err(ParseRenderPolicyError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escapes_markup() {
        assert_eq!(
            RenderPolicy::EscapedHtml.render("<b>1&2"),
            "&lt;b&gt;1&amp;2"
        );
    }

    #[test]
    fn html_escapes_quotes() {
        let out = RenderPolicy::EscapedHtml.render(r#"she said "don't""#);
        assert!(!out.contains('"'), "got: {out}");
        assert!(!out.contains('\''), "got: {out}");
        // The escaped form must still decode back to the original text.
        let unescaped = out.replace("&nbsp;", " ");
        let decoded = html_escape::decode_html_entities(&unescaped);
        assert_eq!(decoded, r#"she said "don't""#);
    }

    #[test]
    fn html_rewrites_whitespace() {
        assert_eq!(RenderPolicy::EscapedHtml.render("a b"), "a&nbsp;b");
        assert_eq!(
            RenderPolicy::EscapedHtml.render("a\tb"),
            "a&nbsp;&nbsp;&nbsp;&nbsp;b"
        );
        assert_eq!(
            RenderPolicy::EscapedHtml.render("line one\nline two"),
            "line&nbsp;one</br>line&nbsp;two"
        );
    }

    #[test]
    fn html_collapses_crlf_to_one_break() {
        assert_eq!(RenderPolicy::EscapedHtml.render("a\r\nb"), "a</br>b");
        assert_eq!(RenderPolicy::EscapedHtml.render("a\rb"), "a</br>b");
    }

    #[test]
    fn html_passes_eof_marker_through() {
        assert_eq!(RenderPolicy::EscapedHtml.render("EOF"), "EOF");
    }

    #[test]
    fn json_wraps_the_raw_payload() {
        assert_eq!(
            RenderPolicy::JsonWrapped.render("hi there"),
            r#"{"content":"hi there"}"#
        );
        assert_eq!(
            RenderPolicy::JsonWrapped.render("<b>&</b>"),
            r#"{"content":"<b>&</b>"}"#
        );
    }

    #[test]
    fn json_encodes_control_characters() {
        assert_eq!(
            RenderPolicy::JsonWrapped.render("a\nb"),
            r#"{"content":"a\nb"}"#
        );
    }

    #[test]
    fn both_modes_emit_single_line_output() {
        let gnarly = "for x in xs:\n\tprint(x)\r\n";
        for policy in [RenderPolicy::EscapedHtml, RenderPolicy::JsonWrapped] {
            let out = policy.render(gnarly);
            assert!(
                !out.contains('\n') && !out.contains('\r'),
                "{policy}: {out}"
            );
        }
    }

    #[test]
    fn empty_payload_stays_empty() {
        assert_eq!(RenderPolicy::EscapedHtml.render(""), "");
        assert_eq!(RenderPolicy::JsonWrapped.render(""), r#"{"content":""}"#);
    }

    #[test]
    fn parses_from_flag_values() {
        assert_eq!("html".parse::<RenderPolicy>().unwrap(), RenderPolicy::EscapedHtml);
        assert_eq!("json".parse::<RenderPolicy>().unwrap(), RenderPolicy::JsonWrapped);
        assert!("xml".parse::<RenderPolicy>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for policy in [RenderPolicy::EscapedHtml, RenderPolicy::JsonWrapped] {
            assert_eq!(policy.to_string().parse::<RenderPolicy>().unwrap(), policy);
        }
    }
}
