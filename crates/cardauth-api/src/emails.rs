//! HTML bodies for notification e-mails. All share one layout; every value
//! interpolated into markup is escaped first.

const LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{heading}</title>
    <style>
        body { font-family: 'Helvetica Neue', Arial, sans-serif; background-color: #f9f9f9; margin: 0; padding: 20px; color: #333; }
        .container { max-width: 600px; margin: 0 auto; background-color: white; border-radius: 12px; box-shadow: 0 4px 12px rgba(0,0,0,0.1); overflow: hidden; }
        .header { background: linear-gradient(135deg, #4a90e2, #5c6bc0); color: white; padding: 25px 30px; text-align: center; }
        .header h1 { margin: 0; font-size: 24px; font-weight: 600; }
        .content { padding: 30px; text-align: center; }
        .greeting { font-size: 18px; margin-bottom: 25px; color: #555; }
        .notice { background-color: #fff8e1; border-left: 5px solid #ffc107; padding: 20px; border-radius: 8px; margin: 20px 0; font-size: 16px; line-height: 1.6; }
        .highlight { color: #e91e63; font-weight: bold; font-size: 18px; }
        .app-link { margin: 30px 0; padding: 20px; background-color: #e3f2fd; border-radius: 8px; }
        .app-link a { color: #1976d2; font-size: 18px; font-weight: bold; text-decoration: none; border-bottom: 2px solid #1976d2; padding-bottom: 3px; }
        .footer { background-color: #f5f5f5; padding: 20px 30px; text-align: center; color: #777; font-size: 14px; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header"><h1>{heading}</h1></div>
        <div class="content">
            <p class="greeting">{greeting}</p>
            <div class="notice">{notice}</div>
            <div class="app-link">
                Open the app for details:<br><br>
                <a href="{app_url}" target="_blank">View in Cardauth</a>
            </div>
        </div>
        <div class="footer">This is an automated notification, please do not reply.</div>
    </div>
</body>
</html>
"#;

pub struct EmailContent {
    pub subject: String,
    pub html_body: String,
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn highlight(value: &str) -> String {
    format!(r#"<span class="highlight">{}</span>"#, escape_html(value))
}

// `notice` is already markup; everything else is escaped here.
fn render(heading: &str, greeting: &str, notice: &str, app_url: &str) -> String {
    LAYOUT
        .replace("{heading}", &escape_html(heading))
        .replace("{greeting}", &escape_html(greeting))
        .replace("{app_url}", &escape_html(app_url))
        .replace("{notice}", notice)
}

pub fn card_received(from_nickname: &str, card_title: &str, app_url: &str) -> EmailContent {
    let notice = format!(
        "You received a card from {}:<br><br>{}",
        highlight(from_nickname),
        highlight(card_title)
    );
    EmailContent {
        subject: format!("You received a card: {card_title}"),
        html_body: render("New card", "Congratulations!", &notice, app_url),
    }
}

pub fn card_used(owner_nickname: &str, card_title: &str, app_url: &str) -> EmailContent {
    let notice = format!(
        "{} just used your card:<br><br>{}",
        highlight(owner_nickname),
        highlight(card_title)
    );
    EmailContent {
        subject: format!("Card used: {card_title}"),
        html_body: render("Card used", "Hello!", &notice, app_url),
    }
}

pub fn friend_invite(from_nickname: &str, from_email: &str, app_url: &str) -> EmailContent {
    let notice = format!(
        "{} sent you a friend request:<br><br>{}",
        highlight(from_nickname),
        highlight(from_email)
    );
    EmailContent {
        subject: "You have a new friend request".to_string(),
        html_body: render("Friend request", "Hello!", &notice, app_url),
    }
}

pub fn invite_accepted(nickname: &str, email: &str, app_url: &str) -> EmailContent {
    let notice = format!(
        "{} accepted your friend request<br><br>{}",
        highlight(nickname),
        highlight(email)
    );
    EmailContent {
        subject: format!("{nickname} accepted your friend request"),
        html_body: render("Request accepted", "Hello!", &notice, app_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn card_received_names_sender_and_card() {
        let mail = card_received("Ally", "Movie night", "http://localhost:18080/");
        assert_eq!(mail.subject, "You received a card: Movie night");
        assert!(mail.html_body.contains(r#"<span class="highlight">Ally</span>"#));
        assert!(mail.html_body.contains("Movie night"));
        assert!(mail.html_body.contains(r#"href="http://localhost:18080/""#));
        assert!(!mail.html_body.contains("{notice}"));
    }

    #[test]
    fn user_values_cannot_inject_html() {
        let mail = card_used("<script>x</script>", "t", "http://localhost/");
        assert!(!mail.html_body.contains("<script>"));
        assert!(mail.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn invite_templates_include_email() {
        let invite = friend_invite("Bob", "bob@example.com", "http://localhost/");
        assert!(invite.html_body.contains("bob@example.com"));
        let accepted = invite_accepted("Bob", "bob@example.com", "http://localhost/");
        assert_eq!(accepted.subject, "Bob accepted your friend request");
    }
}
