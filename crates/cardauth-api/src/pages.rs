use axum::response::Html;

macro_rules! include_page {
    ($p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res/pages/", $p))
    };
}

fn render(title: &str, content: &str, script: Option<&str>) -> Html<String> {
    let script = script
        .map(|name| format!(r#"<script src="/static/js/{name}.js"></script>"#))
        .unwrap_or_default();

    Html(
        include_page!("layout.html")
            .replace("{title}", title)
            .replace("{script}", &script)
            .replace("{content}", content),
    )
}

pub async fn index() -> Html<String> {
    render("Home", include_page!("index.html"), None)
}

pub async fn login() -> Html<String> {
    render("Log in", include_page!("login.html"), Some("login"))
}

pub async fn register() -> Html<String> {
    render("Sign up", include_page!("register.html"), Some("register"))
}

pub async fn dashboard() -> Html<String> {
    render("Dashboard", include_page!("dashboard.html"), Some("dashboard"))
}

pub async fn cards() -> Html<String> {
    render("Cards", include_page!("cards.html"), Some("cards"))
}

pub async fn create_card() -> Html<String> {
    render("New card", include_page!("create_card.html"), Some("create_card"))
}

pub async fn friends() -> Html<String> {
    render("Friends", include_page!("friends.html"), Some("friends"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_fill_every_placeholder() {
        for Html(body) in [
            index().await,
            login().await,
            register().await,
            dashboard().await,
            cards().await,
            create_card().await,
            friends().await,
        ] {
            assert!(body.starts_with("<!DOCTYPE html>"));
            for placeholder in ["{title}", "{content}", "{script}"] {
                assert!(!body.contains(placeholder), "unfilled {placeholder}");
            }
        }
    }

    #[tokio::test]
    async fn page_script_is_linked() {
        let Html(body) = friends().await;
        assert!(body.contains(r#"<script src="/static/js/friends.js"></script>"#));
        assert!(body.contains("<title>Friends · Cardauth</title>"));
    }
}
