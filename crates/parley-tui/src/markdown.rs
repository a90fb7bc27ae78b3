//! Markdown to styled terminal lines
//!
//! Covers what chat replies actually use: headings, emphasis, inline code,
//! fenced code blocks, lists, blockquotes and rules. Anything else is shown
//! as plain text.

use crate::theme::Theme;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

pub fn to_lines(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            if in_code_block {
                let lang = trimmed.trim_start_matches('`').trim();
                if !lang.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", lang),
                        theme.dim().add_modifier(Modifier::ITALIC),
                    )));
                }
            }
            continue;
        }

        if in_code_block {
            lines.push(Line::from(Span::styled(format!("  {}", raw), theme.code())));
            continue;
        }

        lines.push(block_line(raw, trimmed, theme));
    }

    lines
}

fn block_line(raw: &str, trimmed: &str, theme: &Theme) -> Line<'static> {
    if let Some((level, heading)) = heading(trimmed) {
        let mut style = theme.label(theme.accent);
        if level == 1 {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        return Line::from(parse_inline(heading, style, theme));
    }

    if is_rule(trimmed) {
        return Line::from(Span::styled("─".repeat(24), theme.dim()));
    }

    if let Some(quote) = trimmed.strip_prefix('>') {
        let style = theme.dim().add_modifier(Modifier::ITALIC);
        let mut spans = vec![Span::styled("│ ", theme.dim())];
        spans.extend(parse_inline(quote.trim_start(), style, theme));
        return Line::from(spans);
    }

    let indent = &raw[..raw.len() - trimmed.len()];

    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = trimmed.strip_prefix(marker) {
            let mut spans = vec![Span::raw(format!("{}• ", indent))];
            spans.extend(parse_inline(item, theme.text(), theme));
            return Line::from(spans);
        }
    }

    if let Some((number, item)) = ordered_item(trimmed) {
        let mut spans = vec![
            Span::raw(indent.to_string()),
            Span::styled(format!("{} ", number), Style::default().fg(theme.accent)),
        ];
        spans.extend(parse_inline(item, theme.text(), theme));
        return Line::from(spans);
    }

    parse_line(raw, theme)
}

/// `12. item` or `12) item` -> ("12.", "item")
fn ordered_item(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &line[digits..];
    if !(rest.starts_with(". ") || rest.starts_with(") ")) {
        return None;
    }
    Some((&line[..digits + 1], &rest[2..]))
}

/// `## Title` -> (2, "Title")
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && ['-', '*', '_'].iter().any(|&c| line.chars().all(|ch| ch == c))
}

fn parse_line(text: &str, theme: &Theme) -> Line<'static> {
    let spans = parse_inline(text, theme.text(), theme);
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Split a line into spans for **bold**, *italic*, _italic_ and `code`.
/// Unclosed markers are kept as literal text.
fn parse_inline(text: &str, base: Style, theme: &Theme) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        let styled = match c {
            '`' => find_seq(&chars, i + 1, &['`'])
                .map(|end| (i + 1, end, end + 1, theme.code())),
            '*' if chars.get(i + 1) == Some(&'*') => find_seq(&chars, i + 2, &['*', '*'])
                .filter(|end| *end > i + 2)
                .map(|end| (i + 2, end, end + 2, base.add_modifier(Modifier::BOLD))),
            '*' | '_' => {
                let at_word_start = i == 0 || !chars[i - 1].is_alphanumeric();
                let opens = chars.get(i + 1).is_some_and(|next| !next.is_whitespace());
                if at_word_start && opens {
                    find_seq(&chars, i + 1, &[c])
                        .map(|end| (i + 1, end, end + 1, base.add_modifier(Modifier::ITALIC)))
                } else {
                    None
                }
            }
            _ => None,
        };

        match styled {
            Some((start, end, next, style)) => {
                if !plain.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut plain), base));
                }
                let inner: String = chars[start..end].iter().collect();
                spans.push(Span::styled(inner, style));
                i = next;
            }
            None => {
                plain.push(c);
                i += 1;
            }
        }
    }

    if !plain.is_empty() {
        spans.push(Span::styled(plain, base));
    }

    spans
}

fn find_seq(chars: &[char], from: usize, pattern: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    (from..chars.len()).find(|&j| chars[j..].starts_with(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(text: &str) -> Vec<Line<'static>> {
        to_lines(text, &Theme::dark())
    }

    #[test]
    fn test_heading_drops_hashes_and_is_bold() {
        let lines = render("## Summary");
        assert_eq!(text_of(&lines[0]), "Summary");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        let lines = render("#hashtag");
        assert_eq!(text_of(&lines[0]), "#hashtag");
    }

    #[test]
    fn test_inline_bold_italic_and_code() {
        let lines = render("a **bold** and *soft* with `code`");
        let spans = &lines[0].spans;
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        let soft = spans.iter().find(|s| s.content == "soft").unwrap();
        let code = spans.iter().find(|s| s.content == "code").unwrap();

        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        assert!(soft.style.add_modifier.contains(Modifier::ITALIC));
        assert_eq!(code.style, Theme::dark().code());
        assert_eq!(text_of(&lines[0]), "a bold and soft with code");
    }

    #[test]
    fn test_unclosed_bold_is_literal() {
        let lines = render("2 ** 3 is eight");
        assert_eq!(text_of(&lines[0]), "2 ** 3 is eight");
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        let lines = render("call my_var_name now");
        assert_eq!(text_of(&lines[0]), "call my_var_name now");
        assert_eq!(lines[0].spans.len(), 1);
    }

    #[test]
    fn test_code_block_is_verbatim() {
        let lines = render("before\n```rust\nlet x = **y**;\n```\nafter");
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(texts, vec!["before", "  rust", "  let x = **y**;", "after"]);
        assert_eq!(lines[2].spans[0].style, Theme::dark().code());
    }

    #[test]
    fn test_lists_quotes_and_rules() {
        let lines = render("- one\n  * nested\n1. first\n> quoted\n---");
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(
            texts,
            vec!["• one", "  • nested", "1. first", "│ quoted", "─".repeat(24).as_str()]
        );
    }

    #[test]
    fn test_numbered_list_marker_is_styled() {
        let theme = Theme::dark();
        let lines = render("1. first **step**\n  10) tenth\n2.5 is a number");

        assert_eq!(lines[0].spans[1].content, "1. ");
        assert_eq!(lines[0].spans[1].style.fg, Some(theme.accent));
        assert_eq!(text_of(&lines[0]), "1. first step");
        assert_eq!(text_of(&lines[1]), "  10) tenth");
        assert_eq!(lines[1].spans[1].content, "10) ");
        assert_eq!(lines[2].spans.len(), 1);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        let lines = render("a\n\nb");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].spans.is_empty());
    }
}
