//! Terminal output formatting.

use selfnotes_retrieval::SourceRef;

/// Width answers are wrapped to.
pub const WRAP_WIDTH: usize = 80;

const RULE_WIDTH: usize = 50;

/// Wrap prose paragraphs to `width`, leaving list items and code blocks as
/// they are.
pub fn format_answer(text: &str, width: usize) -> String {
    text.trim()
        .split("\n\n")
        .map(|paragraph| {
            if is_preformatted(paragraph) {
                paragraph.to_string()
            } else {
                textwrap::fill(paragraph, width)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_preformatted(paragraph: &str) -> bool {
    let trimmed = paragraph.trim_start();
    if trimmed.starts_with(['-', '*']) || trimmed.starts_with("```") {
        return true;
    }
    // Numbered list items: "1.", "12."
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with('.')
}

/// A heading framed by rules.
pub fn banner(title: &str, rule: char) -> String {
    let line = rule.to_string().repeat(RULE_WIDTH);
    format!("{line}\n  {title}\n{line}")
}

/// A horizontal rule.
pub fn rule(rule: char) -> String {
    rule.to_string().repeat(RULE_WIDTH)
}

/// One indented entry per source: title, then url when there is one.
pub fn format_sources(sources: &[SourceRef], bracketed: bool) -> String {
    let mut out = String::new();
    for source in sources {
        if bracketed {
            out.push_str(&format!("  [{}]\n", source.title));
        } else {
            out.push_str(&format!("  {}\n", source.title));
        }
        if !source.url.is_empty() {
            out.push_str(&format!("  {}\n", source.url));
        }
        out.push('\n');
    }
    out
}
