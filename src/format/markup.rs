use pulldown_cmark::{Event, Tag, TagEnd, html};

/// Renders message text as HTML.
///
/// Only two rules apply: a newline becomes `<br />` and a `*span*` pair becomes
/// `<strong>span</strong>`. Pairs match left to right; a lone trailing `*`
/// stays literal. All other text is escaped, so user content can't inject
/// tags.
pub fn to_display_markup(content: &str) -> String {
    let spans: Vec<&str> = content.split('*').collect();
    let last = spans.len() - 1;

    let mut events = Vec::new();
    for (i, span) in spans.iter().enumerate() {
        let delimited = i % 2 == 1;
        let strong = delimited && i < last;
        if delimited && !strong {
            push_text(&mut events, "*");
        }

        if strong {
            events.push(Event::Start(Tag::Strong));
        }
        push_text(&mut events, span);
        if strong {
            events.push(Event::End(TagEnd::Strong));
        }
    }

    let mut out = String::with_capacity(content.len());
    html::push_html(&mut out, events.into_iter());
    out
}

/// Escapes text for HTML bodies and quoted attributes, quotes included.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // writing to a String can't fail
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}

/// Escapes a URL for a quoted `href`/`src`. Quotes and spaces get
/// percent-encoded, so the value can't leave its attribute.
pub fn escape_href(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let _ = pulldown_cmark_escape::escape_href(&mut out, url);
    out
}

fn push_text<'a>(events: &mut Vec<Event<'a>>, text: &'a str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            events.push(Event::HardBreak);
        }
        if !line.is_empty() {
            events.push(Event::Text(line.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_pair() {
        assert!(to_display_markup("*bold*").contains("<strong>bold</strong>"));
        assert_eq!(
            to_display_markup("a *b* c *d*"),
            "a <strong>b</strong> c <strong>d</strong>"
        );
    }

    #[test]
    fn escapes_attribute_text() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
        assert_eq!(escape_html("it's"), "it&#39;s");
    }

    #[test]
    fn href_keeps_url_inside_quotes() {
        assert_eq!(
            escape_href(r#"http://x" onerror="alert(1)"#),
            "http://x%22%20onerror=%22alert(1)"
        );
        assert_eq!(
            escape_href("https://www.google.com/maps?q=10,20&z=3"),
            "https://www.google.com/maps?q=10,20&amp;z=3"
        );
    }

    #[test]
    fn newline_becomes_break() {
        let html = to_display_markup("a\nb");
        assert_eq!(html.matches("<br />").count(), 1);
        assert!(html.starts_with('a') && html.ends_with('b'));
    }

    #[test]
    fn emphasis_can_span_lines() {
        let html = to_display_markup("*one\ntwo*");
        assert!(html.starts_with("<strong>one<br />"), "{html}");
        assert!(html.ends_with("two</strong>"), "{html}");
    }

    #[test]
    fn unpaired_star_is_literal() {
        assert_eq!(to_display_markup("2 * 3"), "2 * 3");
        assert_eq!(to_display_markup("*a* and *b"), "<strong>a</strong> and *b");
    }

    #[test]
    fn markup_is_escaped() {
        let html = to_display_markup("<script>alert('x')</script> & *<b>*");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("<strong>&lt;b&gt;</strong>"));
    }

    #[test]
    fn empty_content() {
        assert_eq!(to_display_markup(""), "");
    }
}
