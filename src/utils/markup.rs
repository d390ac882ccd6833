use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<script\b[^>]*>.*?</script\s*>"));
static STYLE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<style\b[^>]*>.*?</style\s*>"));
static COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<!--.*?-->"));
static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<[^>]*>"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,9});"));

fn compile(pattern: &str) -> Regex {
    // 固定パターンなので失敗しない
    Regex::new(pattern).expect("markup pattern must compile")
}

/// Strip markup from shared post bodies.
/// - `<script>` and `<style>` elements are removed with their bodies
/// - comments are removed
/// - every matched `<...>` tag becomes a space so adjacent words never fuse
/// - entities are decoded last, unknown ones become a space
///
/// Text that only looks like markup (`5 < 6`, an unclosed `<script>`) is
/// kept as ordinary text.
pub fn strip_markup(text: &str) -> String {
    let text = SCRIPT.replace_all(text, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    ENTITY
        .replace_all(&text, |caps: &Captures| {
            decode_entity(&caps[1]).unwrap_or(' ').to_string()
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
