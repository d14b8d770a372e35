//! Idempotent HTML patching for the mobile-app shell (SPEC_FULL.md §4.5.5).
//! Each patch checks presence before acting, so applying it twice is a
//! no-op both times after the first.

const VIEWPORT_TAG: &str =
    "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0, user-scalable=no\">";
const CSP_TAG: &str = "<meta http-equiv=\"Content-Security-Policy\" content=\"default-src * 'self' 'unsafe-inline' 'unsafe-eval' data: gap: content:\">";
const CORDOVA_SCRIPT: &str = "<script src=\"cordova.js\"></script>";

pub fn patch(html: &str) -> String {
    let mut patched = html.to_string();
    patched = insert_into_head(&patched, "viewport", VIEWPORT_TAG);
    patched = insert_into_head(&patched, "Content-Security-Policy", CSP_TAG);
    patched = insert_before_body_close(&patched, "cordova.js", CORDOVA_SCRIPT);
    patched
}

fn insert_into_head(html: &str, presence_marker: &str, tag: &str) -> String {
    if html.contains(presence_marker) {
        return html.to_string();
    }
    match html.find("<head>") {
        Some(idx) => {
            let insert_at = idx + "<head>".len();
            format!("{}{}{}", &html[..insert_at], tag, &html[insert_at..])
        }
        None => match html.find("<html>") {
            Some(idx) => {
                let insert_at = idx + "<html>".len();
                format!(
                    "{}<head>{}</head>{}",
                    &html[..insert_at],
                    tag,
                    &html[insert_at..]
                )
            }
            None => format!("<head>{}</head>{}", tag, html),
        },
    }
}

fn insert_before_body_close(html: &str, presence_marker: &str, tag: &str) -> String {
    if html.contains(presence_marker) {
        return html.to_string();
    }
    match html.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tag, &html[idx..]),
        None => format!("{}{}", html, tag),
    }
}
