//! Page-number placeholders in header/footer markup.
//!
//! Recognised tokens are `{{ PageNumber }}` and `{{ PageCount }}`: a literal
//! double-brace delimiter, any amount of whitespace, and a case-sensitive
//! keyword. Anything else, including unknown or unterminated brace content,
//! is copied through unchanged.

use crate::page::PageContext;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    PageNumber,
    PageCount,
}

impl Token {
    fn value(self, ctx: PageContext) -> u32 {
        match self {
            Token::PageNumber => ctx.page_number,
            Token::PageCount => ctx.page_count,
        }
    }
}

/// Replace every recognised token in `template` with its value for `ctx`.
///
/// Single left-to-right pass; replacement text is never re-scanned.
pub fn substitute(template: &str, ctx: PageContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match match_token(candidate) {
            Some((token, consumed)) => {
                out.push_str(&token.value(ctx).to_string());
                rest = &candidate[consumed..];
            }
            None => {
                // Emit one brace and rescan, so "{{{ PageNumber }}" still
                // finds the token that starts at the second brace.
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `true` if `template` contains at least one recognised token.
pub fn has_placeholders(template: &str) -> bool {
    template
        .match_indices(OPEN)
        .any(|(i, _)| match_token(&template[i..]).is_some())
}

/// Match a token at the start of `s` (which begins with `{{`). Returns the
/// token and the number of bytes it spans.
fn match_token(s: &str) -> Option<(Token, usize)> {
    let inner = &s[OPEN.len()..];
    let trimmed = inner.trim_start();
    let leading = inner.len() - trimmed.len();

    let (token, keyword) = if trimmed.starts_with("PageNumber") {
        (Token::PageNumber, "PageNumber")
    } else if trimmed.starts_with("PageCount") {
        (Token::PageCount, "PageCount")
    } else {
        return None;
    };

    let after = &trimmed[keyword.len()..];
    let tail = after.trim_start();
    if !tail.starts_with(CLOSE) {
        return None;
    }
    let trailing = after.len() - tail.len();
    Some((token, OPEN.len() + leading + keyword.len() + trailing + CLOSE.len()))
}
