//! Rich-text sanitizing for user supplied resource descriptions

use sanitize_html::sanitize_str;
use sanitize_html::rules::{ Rules, Element };
use sanitize_html::rules::pattern::Pattern;
use regex::Regex;

fn styled(name: &str) -> Element {
    Element::new(name).attribute("class", Pattern::any())
}

pub fn description_rules() -> Result<Rules, regex::Error> {
    // Links may not use javascript: style schemes
    let a = styled("a")
        .attribute("href", Pattern::regex(Regex::new("^(https?://|/|#)[^\\s]*$")?))
        .attribute("rel", Pattern::any()).attribute("target", Pattern::any());

    let mut rules = Rules::new().allow_comments(false).element(a);
    for tag in ["p", "ul", "ol", "li", "b", "strong", "i", "em", "mark", "small",
                "sub", "sup", "br", "h3", "h4", "h5", "span", "div"] {
        rules = rules.element(styled(tag));
    }

    Ok(rules
        .delete("style").delete("script").delete("object").delete("head").delete("link").delete("body")
        .delete("iframe").delete("applet").delete("comment").delete("embed").delete("meta")
        .delete("noscript").delete("plaintext").delete("xmp"))
}

pub fn clean_description(input: &str) -> Result<String, String> {
    let rules = description_rules().map_err(|e| e.to_string())?;
    sanitize_str(&rules, input).map_err(|e| format!("{e:?}"))
}

/// Escapes plain text the way the sanitizer serializes text nodes, so a
/// search term can be compared against a stored description.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c)
        }
    }
    out
}
