use crate::{
    controller::DisplayMessage,
    format::{Kind, escape_href, escape_html},
    include_res,
};

pub fn msg_to_html(message: &DisplayMessage) -> String {
    let link = message.link.as_deref().map(escape_href).unwrap_or_default();
    let body = match message.kind {
        Kind::Photo => format!(r#"<img class="photo" src="{link}" alt="photo">"#),
        Kind::Location => {
            format!(r#"<a class="location" href="{link}" target="_blank" rel="noopener">📍 My location</a>"#)
        }
        Kind::Text | Kind::Enriched => message.markup.clone(),
    };

    let avatar = match &message.avatar_url {
        Some(url) => format!(r#"<img class="avatar" src="{}" alt="">"#, escape_href(url)),
        None => String::new(),
    };

    let sent_at = message.sent_at;
    include_res!(str, "/pages/chat/message.html")
        .replace("{id}", &message.id.to_string())
        .replace("{own}", if message.own { " own" } else { "" })
        .replace("{kind}", kind_class(message.kind))
        .replace("{avatar}", &avatar)
        .replace("{author}", &escape_html(&message.author))
        .replace("{timestamp}", &sent_at.unix_timestamp().to_string())
        .replace("{time}", &format!("{:02}:{:02}", sent_at.hour(), sent_at.minute()))
        .replace("{body}", &body)
}

pub fn msgs_to_html(messages: &[DisplayMessage]) -> String {
    messages.iter().map(msg_to_html).collect()
}

fn kind_class(kind: Kind) -> &'static str {
    match kind {
        Kind::Text => "text",
        Kind::Location => "location",
        Kind::Photo => "photo",
        Kind::Enriched => "enriched",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::AuthorProfile, testing::message};

    #[test]
    fn text_is_escaped_and_marked_up() {
        let mut sent = message("<b>hi</b> *there*");
        sent.author = Some(AuthorProfile { name: "No-Face".to_owned(), avatar_url: None });
        let html = msg_to_html(&DisplayMessage::new(&sent, Some(sent.user_id)));

        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt; <strong>there</strong>"));
        assert!(html.contains("No-Face"));
        assert!(html.contains(r#"class="message own""#));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn photo_and_location_get_links() {
        let photo = DisplayMessage::new(&message("📷 Photo: https://cdn.test/p.jpeg"), None);
        assert!(msg_to_html(&photo).contains(r#"src="https://cdn.test/p.jpeg""#));

        let location = DisplayMessage::new(&message("📍 My location: https://www.google.com/maps?q=1.5,2"), None);
        let html = msg_to_html(&location);
        assert!(html.contains(r#"href="https://www.google.com/maps?q=1.5,2""#));
        assert!(html.contains(r#"class="body location""#));
    }

    #[test]
    fn quotes_cannot_break_out_of_attributes() {
        let mut sent = message(r#"📷 Photo: http://x" onerror="alert(1)"#);
        sent.author = Some(AuthorProfile {
            name: r#"Yubaba" onmouseover="x"#.to_owned(),
            avatar_url: Some(r#"https://img.test/a.png" onload="alert(2)"#.to_owned()),
        });
        let html = msg_to_html(&DisplayMessage::new(&sent, None));

        assert!(!html.contains(r#"onerror="alert"#));
        assert!(!html.contains(r#"onload="alert"#));
        assert!(!html.contains(r#"" onmouseover"#));
        assert!(html.contains(r#"src="http://x%22%20onerror=%22alert(1)""#));
        assert!(html.contains("Yubaba&quot; onmouseover=&quot;x"));
    }
}
