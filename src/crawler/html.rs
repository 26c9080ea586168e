// src/crawler/html.rs
//! HTML → markdown-flavoured plain text for LLM prompts.
//!
//! Content root is `article`, then `main`, then `body`. Navigation chrome,
//! scripts and styles are dropped; headings, lists, code, tables and
//! definition lists keep a markdown shape so the model sees structure.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "iframe", "nav", "footer", "header", "form", "template",
];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "blockquote", "aside", "figure", "figcaption", "li",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub title: Option<String>,
    pub text: String,
}

impl PageText {
    /// Title as a top-level heading followed by the body text.
    pub fn to_markdown(&self) -> String {
        match &self.title {
            Some(t) => format!("# {}\n\n{}", t, self.text),
            None => self.text.clone(),
        }
    }
}

pub fn extract_page_text(html: &str) -> PageText {
    let doc = Html::parse_document(html);

    let title = select_first(&doc, "title")
        .map(|el| collapse_inline(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut raw = String::new();
    if let Some(root) = ["article", "main", "body"].iter().find_map(|tag| select_first(&doc, tag)) {
        write_element(root, &mut raw);
    }

    PageText { title, text: tidy_blank_lines(&raw) }
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

fn write_element(el: ElementRef, out: &mut String) {
    let tag = el.value().name();
    if SKIPPED_TAGS.contains(&tag) {
        return;
    }

    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            let text = collapse_inline(&el.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                out.push_str(&format!("\n{} {}\n\n", "#".repeat(level), text));
            }
            return;
        }
        "pre" => {
            let code: String = el.text().collect();
            if !code.trim().is_empty() {
                out.push_str(&format!("\n```\n{}\n```\n", code.trim_end()));
            }
            return;
        }
        "table" => {
            write_table(el, out);
            return;
        }
        "dl" => {
            write_definition_list(el, out);
            return;
        }
        "img" => {
            if let Some(alt) = el.value().attr("alt").map(str::trim).filter(|a| !a.is_empty()) {
                out.push_str(&format!("[image: {}] ", alt));
            }
            return;
        }
        "br" => {
            out.push('\n');
            return;
        }
        "hr" => {
            out.push_str("\n---\n");
            return;
        }
        "li" => out.push_str("\n- "),
        _ if BLOCK_TAGS.contains(&tag) => out.push('\n'),
        _ => {}
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let t = collapse_inline(&text.text);
                if !t.is_empty() {
                    out.push_str(&t);
                    out.push(' ');
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(child_el, out);
                }
            }
            _ => {}
        }
    }

    if BLOCK_TAGS.contains(&tag) {
        out.push('\n');
    }
}

fn write_table(table: ElementRef, out: &mut String) {
    let Ok(row_sel) = Selector::parse("tr") else { return };
    let Ok(cell_sel) = Selector::parse("th, td") else { return };

    let rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .map(|row| {
            row.select(&cell_sel)
                .map(|cell| collapse_inline(&cell.text().collect::<Vec<_>>().join(" ")).replace('|', "\\|"))
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect();

    let Some(first) = rows.first() else { return };
    out.push('\n');
    out.push_str(&format!("| {} |\n", first.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(first.len())));
    for row in rows.iter().skip(1) {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out.push('\n');
}

fn write_definition_list(dl: ElementRef, out: &mut String) {
    out.push('\n');
    for child in dl.children().filter_map(ElementRef::wrap) {
        let text = collapse_inline(&child.text().collect::<Vec<_>>().join(" "));
        if text.is_empty() {
            continue;
        }
        match child.value().name() {
            "dt" => out.push_str(&format!("**{}**\n", text)),
            "dd" => out.push_str(&format!(": {}\n", text)),
            _ => {}
        }
    }
    out.push('\n');
}

/// Collapse runs of whitespace into single spaces.
fn collapse_inline(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim trailing spaces per line and allow at most one blank line in a row.
fn tidy_blank_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line.trim_start_matches(' '));
            out.push('\n');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_headings_become_markdown() {
        let page = extract_page_text(
            "<html><head><title> Shop </title></head><body><h2>Lamps</h2><p>Warm light.</p></body></html>",
        );
        assert_eq!(page.title.as_deref(), Some("Shop"));
        assert_eq!(page.to_markdown(), "# Shop\n\n## Lamps\n\nWarm light.");
    }

    #[test]
    fn noise_is_dropped() {
        let page = extract_page_text(
            "<body><nav>Home | About</nav><script>var x = 1;</script><p>Kept</p><footer>(c)</footer></body>",
        );
        assert_eq!(page.text, "Kept");
    }

    #[test]
    fn article_is_preferred_over_body() {
        let page = extract_page_text("<body><p>sidebar</p><article><p>story</p></article></body>");
        assert_eq!(page.text, "story");
    }

    #[test]
    fn list_items_are_bulleted() {
        let page = extract_page_text("<body><ul><li>One</li><li>Two</li></ul></body>");
        assert!(page.text.contains("- One"));
        assert!(page.text.contains("- Two"));
    }

    #[test]
    fn tables_render_as_pipe_tables() {
        let page = extract_page_text(
            "<body><table><tr><th>Name</th><th>Price</th></tr><tr><td>Lamp</td><td>19.50</td></tr></table></body>",
        );
        assert!(page.text.contains("| Name | Price |"));
        assert!(page.text.contains("| --- | --- |"));
        assert!(page.text.contains("| Lamp | 19.50 |"));
    }

    #[test]
    fn definition_lists_keep_terms() {
        let page = extract_page_text("<body><dl><dt>Weight</dt><dd>2 kg</dd></dl></body>");
        assert!(page.text.contains("**Weight**"));
        assert!(page.text.contains(": 2 kg"));
    }

    #[test]
    fn empty_document_has_no_text() {
        let page = extract_page_text("<html><body><script>1</script></body></html>");
        assert!(page.text.is_empty());
        assert!(page.title.is_none());
    }
}
