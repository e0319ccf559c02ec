//! Usage page served at `/`

/// Man-page style usage text. `{base}` is replaced with the request's base URL.
const USAGE_HTML: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>hashpaste</title>
  </head>
  <body>
    <pre>
hashpaste(1)                    HASHPASTE                    hashpaste(1)

NAME
    hashpaste - command line pastebin.

SYNOPSIS
    &lt;command&gt; | curl -F 'sprunge=&lt;-' {base}

DESCRIPTION
    Pastes are created with an HTTP POST of the form field 'sprunge' and
    can never be changed afterwards. The path of a paste's URL is the
    SHA-256 digest of its contents, so posting the same text twice yields
    the same URL. Pastes may be at most 4 MiB.

EXAMPLE
    $ echo 'hello world' | curl -F 'sprunge=&lt;-' {base}
       {base}/a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447
    $ curl {base}/a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447
    hello world
    </pre>
  </body>
</html>
"#;

/// Render the usage page for `base_url`
pub fn render(base_url: &str) -> String {
    USAGE_HTML.replace("{base}", &escape_html(base_url))
}

/// The base URL comes from the client's Host header, so it must not be
/// trusted as markup.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
