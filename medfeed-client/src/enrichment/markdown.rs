//! Markdown rendering for summaries and takeaways

use pulldown_cmark::{html::push_html, Options, Parser};

/// Render backend markdown to an HTML fragment
pub fn render(text: &str) -> String {
    let parser = Parser::new_ext(text, options());
    let mut html_output = String::new();
    push_html(&mut html_output, parser);
    html_output
}

fn options() -> Options {
    Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES
}
