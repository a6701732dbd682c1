//! User-facing HTML pages for the login flow. Failure pages stay generic;
//! underlying detail goes to the server log only.

fn layout(title: &str, heading: &str, message: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{ font-family: system-ui, sans-serif; display: flex; justify-content: center; margin-top: 15vh; background: #fafafa; }}
  .card {{ max-width: 28rem; padding: 2rem; border: 1px solid #ddd; border-radius: 8px; background: #fff; text-align: center; }}
  h1 {{ font-size: 1.3rem; }}
  p {{ color: #444; }}
</style>
</head>
<body>
<div class="card">
<h1>{heading}</h1>
<p>{message}</p>
</div>
</body>
</html>
"#
    )
}

pub fn success(email: &str) -> String {
    layout(
        "Signed in",
        "You're signed in",
        &format!(
            "Authenticated as <strong>{}</strong>. You can close this tab and return to the chat.",
            escape(email)
        ),
    )
}

pub fn error(heading: &str, message: &str) -> String {
    layout("Sign-in failed", heading, message)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
