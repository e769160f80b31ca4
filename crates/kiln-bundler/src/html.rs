//! HTML document generation: tag injection and minification.

use lightningcss::targets::Targets;
use memchr::memmem;
use tracing::warn;

use crate::script::{ScriptMinifyOptions, minify_script};
use crate::style::minify_css;

/// URLs injected into the document, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAssets {
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
}

/// Minifier settings; `None` leaves inline code untouched.
#[derive(Debug, Clone, Default)]
pub struct HtmlMinifyOptions {
    pub scripts: Option<ScriptMinifyOptions>,
    pub styles: Option<Targets>,
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Insert stylesheet links before `</head>` and scripts before `</body>`.
pub fn inject(html: &str, assets: &PageAssets) -> String {
    let links: String = assets
        .styles
        .iter()
        .map(|href| format!("<link href=\"{}\" rel=\"stylesheet\">", escape_attribute(href)))
        .collect();
    let scripts: String = assets
        .scripts
        .iter()
        .map(|src| format!("<script src=\"{}\"></script>", escape_attribute(src)))
        .collect();

    let with_links = insert_before(html, "</head>", &links, false);
    insert_before(&with_links, "</body>", &scripts, true)
}

fn insert_before(html: &str, closing: &str, fragment: &str, append_fallback: bool) -> String {
    if fragment.is_empty() {
        return html.to_string();
    }
    // ASCII lowercasing keeps byte offsets
    let lower = html.to_ascii_lowercase();
    let position = lower.rfind(closing).or(if append_fallback {
        None
    } else {
        lower.find("<body")
    });
    let mut out = String::with_capacity(html.len() + fragment.len());
    match position {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(fragment);
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push_str(fragment);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Doctype(&'a str),
    Comment(&'a str),
    Text(&'a str),
    Start {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    End(String),
    /// Content of `script`, `style`, `pre` or `textarea`
    Raw(&'a str),
}

const RAW_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "button", "cite", "code", "data", "dfn", "em", "i", "img",
    "input", "kbd", "label", "mark", "q", "s", "samp", "select", "small", "span", "strong",
    "sub", "sup", "time", "u", "var",
];

/// Cheap HTML tokenizer; good enough for application templates.
fn tokenize(html: &str) -> Vec<Token<'_>> {
    let bytes = html.as_bytes();
    let mut tokens = Vec::new();
    let mut pointer = 0;

    while pointer < bytes.len() {
        let rest = &html[pointer..];
        if rest.starts_with("<!--") {
            let end = memmem::find(&bytes[pointer + 4..], b"-->")
                .map(|i| pointer + 4 + i + 3)
                .unwrap_or(bytes.len());
            tokens.push(Token::Comment(&html[pointer..end]));
            pointer = end;
        } else if rest.starts_with("<!") {
            let end = memchr::memchr(b'>', &bytes[pointer..])
                .map(|i| pointer + i + 1)
                .unwrap_or(bytes.len());
            tokens.push(Token::Doctype(&html[pointer..end]));
            pointer = end;
        } else if rest.starts_with("</") {
            let end = memchr::memchr(b'>', &bytes[pointer..])
                .map(|i| pointer + i + 1)
                .unwrap_or(bytes.len());
            let name = html[pointer + 2..end]
                .trim_end_matches('>')
                .trim()
                .to_ascii_lowercase();
            tokens.push(Token::End(name));
            pointer = end;
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (token, end) = parse_start_tag(html, pointer);
            let raw_name = match &token {
                Token::Start {
                    name, self_closing, ..
                } if !self_closing && RAW_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
                _ => None,
            };
            tokens.push(token);
            pointer = end;
            if let Some(name) = raw_name {
                let closing = format!("</{name}");
                let lower = html[pointer..].to_ascii_lowercase();
                let content_end = memmem::find(lower.as_bytes(), closing.as_bytes())
                    .map(|i| pointer + i)
                    .unwrap_or(bytes.len());
                if content_end > pointer {
                    tokens.push(Token::Raw(&html[pointer..content_end]));
                }
                pointer = content_end;
            }
        } else {
            let end = memchr::memchr(b'<', &bytes[pointer + 1..])
                .map(|i| pointer + 1 + i)
                .unwrap_or(bytes.len());
            tokens.push(Token::Text(&html[pointer..end]));
            pointer = end;
        }
    }
    tokens
}

fn parse_start_tag(html: &str, start: usize) -> (Token<'_>, usize) {
    let bytes = html.as_bytes();
    let mut pointer = start + 1;
    let name_start = pointer;
    while pointer < bytes.len() && !matches!(bytes[pointer], b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>') {
        pointer += 1;
    }
    let name = html[name_start..pointer].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;
    loop {
        while pointer < bytes.len() && bytes[pointer].is_ascii_whitespace() {
            pointer += 1;
        }
        if pointer >= bytes.len() {
            break;
        }
        match bytes[pointer] {
            b'>' => {
                pointer += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                pointer += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let attr_start = pointer;
        while pointer < bytes.len()
            && !matches!(bytes[pointer], b' ' | b'\t' | b'\n' | b'\r' | b'=' | b'>')
            && !(bytes[pointer] == b'/' && bytes.get(pointer + 1) == Some(&b'>'))
        {
            pointer += 1;
        }
        let attr_name = html[attr_start..pointer].to_string();
        while pointer < bytes.len() && bytes[pointer].is_ascii_whitespace() {
            pointer += 1;
        }
        let mut value = None;
        if bytes.get(pointer) == Some(&b'=') {
            pointer += 1;
            while pointer < bytes.len() && bytes[pointer].is_ascii_whitespace() {
                pointer += 1;
            }
            match bytes.get(pointer) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let value_start = pointer + 1;
                    let value_end = memchr::memchr(quote, &bytes[value_start..])
                        .map(|i| value_start + i)
                        .unwrap_or(bytes.len());
                    value = Some(html[value_start..value_end].to_string());
                    pointer = (value_end + 1).min(bytes.len());
                }
                _ => {
                    let value_start = pointer;
                    while pointer < bytes.len() && !bytes[pointer].is_ascii_whitespace() && bytes[pointer] != b'>' {
                        pointer += 1;
                    }
                    value = Some(html[value_start..pointer].to_string());
                }
            }
        }
        if !attr_name.is_empty() {
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }
    }

    (
        Token::Start {
            name,
            attributes,
            self_closing,
        },
        pointer,
    )
}

fn is_conditional_comment(comment: &str) -> bool {
    let body = comment.trim_start_matches("<!--").trim_end_matches("-->").trim();
    body.starts_with("[if") || body.ends_with("<![endif]") || body.starts_with("<![endif]")
}

/// True when the attribute adds nothing on this element.
fn is_redundant(element: &str, attribute: &Attribute) -> bool {
    let name = attribute.name.to_ascii_lowercase();
    let value = attribute
        .value
        .as_deref()
        .map(|v| v.trim().to_ascii_lowercase());

    if matches!(
        name.as_str(),
        "class" | "id" | "style" | "title" | "lang" | "dir"
    ) || name.starts_with("on")
    {
        if value.as_deref().is_some_and(str::is_empty) {
            return true;
        }
    }

    match (element, name.as_str(), value.as_deref()) {
        ("script", "type", Some("text/javascript" | "application/javascript")) => true,
        ("script", "language", Some("javascript")) => true,
        ("style" | "link", "type", Some("text/css")) => true,
        ("input", "type", Some("text")) => true,
        ("form", "method", Some("get")) => true,
        _ => false,
    }
}

fn is_javascript(attributes: &[Attribute]) -> bool {
    attributes
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case("type"))
        .and_then(|a| a.value.as_deref())
        .is_none_or(|t| {
            matches!(
                t.trim().to_ascii_lowercase().as_str(),
                "" | "text/javascript" | "application/javascript"
            )
        })
}

fn is_inline(token: Option<&Token<'_>>) -> bool {
    match token {
        Some(Token::Start { name, .. }) | Some(Token::End(name)) => {
            INLINE_ELEMENTS.contains(&name.as_str())
        }
        Some(Token::Text(_)) => true,
        _ => false,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Minify a complete document.
///
/// Comments (except conditional ones) are removed, whitespace is collapsed,
/// redundant and empty attributes are dropped, the doctype is shortened, and
/// inline scripts and styles are minified.
pub fn minify(html: &str, options: &HtmlMinifyOptions) -> String {
    let tokens = tokenize(html);
    let mut out = String::with_capacity(html.len());
    let mut open_raw: Option<(String, bool)> = None;

    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Doctype(doctype) => {
                if doctype.to_ascii_lowercase().starts_with("<!doctype html") {
                    out.push_str("<!doctype html>");
                } else {
                    out.push_str(doctype);
                }
            }
            Token::Comment(comment) => {
                if is_conditional_comment(comment) {
                    out.push_str(comment);
                }
            }
            Token::Text(text) => {
                let previous = index.checked_sub(1).and_then(|i| tokens.get(i));
                let next = tokens.get(index + 1);
                let mut collapsed = collapse_whitespace(text);
                if !is_inline(previous) {
                    collapsed = collapsed.trim_start().to_string();
                }
                if !is_inline(next) {
                    collapsed = collapsed.trim_end().to_string();
                }
                out.push_str(&collapsed);
            }
            Token::Start {
                name,
                attributes,
                self_closing,
            } => {
                out.push('<');
                out.push_str(name);
                for attribute in attributes.iter().filter(|a| !is_redundant(name, a)) {
                    out.push(' ');
                    out.push_str(&attribute.name);
                    if let Some(value) = &attribute.value {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(value));
                        out.push('"');
                    }
                }
                if *self_closing {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    if RAW_ELEMENTS.contains(&name.as_str()) {
                        let javascript = name == "script" && is_javascript(attributes);
                        open_raw = Some((name.clone(), javascript));
                    }
                }
            }
            Token::End(name) => {
                open_raw = None;
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Token::Raw(content) => {
                let minified = match open_raw.as_ref() {
                    Some((element, true)) if element == "script" => {
                        options.scripts.as_ref().and_then(|opts| {
                            if content.trim().is_empty() {
                                return Some(String::new());
                            }
                            minify_script(content, opts)
                                .inspect_err(|err| warn!(error = %err, "inline script left unminified"))
                                .ok()
                        })
                    }
                    Some((element, _)) if element == "style" => options.styles.as_ref().and_then(|targets| {
                        minify_css(content, targets)
                            .inspect_err(|err| warn!(error = %err, "inline style left unminified"))
                            .ok()
                    }),
                    _ => None,
                };
                out.push_str(minified.as_deref().unwrap_or(content));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <!-- page metadata -->
    <meta charset="utf-8">
    <title>  Demo   App </title>
    <!--[if lt IE 9]><script src="html5shiv.js"></script><![endif]-->
    <style type="text/css">
      body  { color : #ff0000; }
    </style>
  </head>
  <body class="">
    <div id="root"></div>
    <p>Hello   <b>world</b> !</p>
    <pre>  keep
   this </pre>
    <script type="text/javascript">
      var greeting = "hi";
      window.greet = function () { return greeting; };
    </script>
  </body>
</html>
"#;

    fn options() -> HtmlMinifyOptions {
        HtmlMinifyOptions {
            scripts: Some(ScriptMinifyOptions::default()),
            styles: Some(Targets::default()),
        }
    }

    #[test]
    fn injects_links_and_scripts() {
        let assets = PageAssets {
            styles: vec!["/static/css/index.0123abcd.css".into()],
            scripts: vec!["/static/js/vendors.11111111.js".into(), "/static/js/index.22222222.js".into()],
        };
        let out = inject("<html><head><title>x</title></head><body><div></div></BODY></html>", &assets);
        assert!(out.contains(
            r#"<link href="/static/css/index.0123abcd.css" rel="stylesheet"></head>"#
        ));
        let vendors = out.find("vendors.11111111.js").unwrap();
        let index = out.find("index.22222222.js").unwrap();
        let body = out.find("</BODY>").unwrap();
        assert!(vendors < index && index < body);
    }

    #[test]
    fn injection_without_body_appends() {
        let assets = PageAssets {
            styles: Vec::new(),
            scripts: vec!["/a.js".into()],
        };
        assert_eq!(inject("<p>x</p>", &assets), r#"<p>x</p><script src="/a.js"></script>"#);
    }

    #[test]
    fn minifies_document() {
        let out = minify(TEMPLATE, &options());
        assert!(out.starts_with("<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">"));
        assert!(!out.contains("page metadata"));
        assert!(out.contains("<!--[if lt IE 9]>"));
        assert!(out.contains("<title>Demo App</title>"));
        assert!(out.contains("<style>body{color:red}</style>"));
        assert!(out.contains("<body><div id=\"root\"></div>"));
        assert!(out.contains("<p>Hello <b>world</b> !</p>"));
        assert!(out.contains("<pre>  keep\n   this </pre>"));
        assert!(out.contains("<script>"));
        assert!(!out.contains("text/javascript"));
        assert!(!out.contains("\n    "));
    }

    #[test]
    fn non_javascript_scripts_are_untouched() {
        let html = "<script type=\"text/template\">  <b> {{x}} </b>  </script>";
        assert_eq!(minify(html, &options()), html);
    }

    #[test]
    fn tokenizer_handles_attributes() {
        let tokens = tokenize(r#"<input disabled value='a "b"' data-x=1 /><br/>"#);
        assert_eq!(
            tokens[0],
            Token::Start {
                name: "input".into(),
                attributes: vec![
                    Attribute { name: "disabled".into(), value: None },
                    Attribute { name: "value".into(), value: Some("a \"b\"".into()) },
                    Attribute { name: "data-x".into(), value: Some("1".into()) },
                ],
                self_closing: true,
            }
        );
        assert!(matches!(&tokens[1], Token::Start { name, self_closing: true, .. } if name == "br"));
    }
}
