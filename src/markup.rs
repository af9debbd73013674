//! Terminal markup for server output.
//!
//! Server messages carry light HTML-like tags (`<sys>`, `<w>`, `<title>`, ...)
//! that are turned into ANSI SGR sequences according to a tag table. Unknown
//! tags pass through as text. `&lt;`, `&gt;`, `&amp;` and `&quot;` are decoded
//! after tag processing so help text can show literal angle brackets.

use std::collections::HashMap;

/// ANSI reset sequence.
const ANSI_RESET: &str = "\x1b[0m";

/// Whether rendered output carries ANSI escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Always emit ANSI codes.
    #[default]
    Always,
    /// Strip tags, emit plain text.
    Never,
}

impl ColorMode {
    pub fn from_enabled(color: bool) -> Self {
        if color { Self::Always } else { Self::Never }
    }
}

/// Map from tag name to the SGR sequence it opens.
#[derive(Debug, Clone, Default)]
pub struct TagStyles {
    tags: HashMap<String, String>,
}

impl TagStyles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag with a space-separated style spec, e.g. `"br bold bgk"`.
    ///
    /// Tokens: `k r g y b m c w` (foreground), a `b` prefix for the bright
    /// variant (`br`), a `bg` prefix for background (`bgk`), and the
    /// attributes `bold`, `dim`, `i`, `u`, `blink`, `rev`. Unknown tokens are
    /// ignored.
    pub fn add(&mut self, tag: &str, spec: &str) {
        let codes: Vec<String> = spec.split_whitespace().filter_map(sgr_code).collect();
        let seq = if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        };
        self.tags.insert(tag.to_ascii_lowercase(), seq);
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }
}

/// The server's tag table.
pub fn server_tags() -> TagStyles {
    let mut t = TagStyles::new();
    t.add("error", "br bold bgk");
    t.add("warning", "y bold");
    t.add("success", "bg bold");
    t.add("info", "bc u");
    t.add("title", "bw bold u");
    t.add("cmd", "g u");
    t.add("w", "m");
    t.add("aw", "bb bold");
    t.add("sys", "by bold");
    t
}

fn color_index(c: &str) -> Option<u8> {
    Some(match c {
        "k" => 0,
        "r" => 1,
        "g" => 2,
        "y" => 3,
        "b" => 4,
        "m" => 5,
        "c" => 6,
        "w" => 7,
        _ => return None,
    })
}

fn sgr_code(token: &str) -> Option<String> {
    let attr = match token {
        "bold" => Some(1),
        "dim" => Some(2),
        "i" => Some(3),
        "u" => Some(4),
        "blink" => Some(5),
        "rev" => Some(7),
        _ => None,
    };
    if let Some(a) = attr {
        return Some(a.to_string());
    }

    let code = match token.len() {
        1 => 30 + color_index(token)?,
        2 if token.starts_with('b') => 90 + color_index(&token[1..])?,
        3 if token.starts_with("bg") => 40 + color_index(&token[2..])?,
        _ => return None,
    };
    Some(code.to_string())
}

/// Renders tagged text.
#[derive(Debug, Clone)]
pub struct Markup {
    styles: TagStyles,
    mode: ColorMode,
}

impl Markup {
    pub fn new(styles: TagStyles, mode: ColorMode) -> Self {
        Self { styles, mode }
    }

    /// The server tag table with the given color mode.
    pub fn server(mode: ColorMode) -> Self {
        Self::new(server_tags(), mode)
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Wrap text in the system tag and render it.
    pub fn sys(&self, text: &str) -> String {
        self.render(&format!("<sys>{text}</sys>"))
    }

    /// Replace known tags with escapes and decode entities.
    pub fn render(&self, input: &str) -> String {
        let color = self.mode == ColorMode::Always;
        let mut out = String::with_capacity(input.len() + 16);
        let mut open: Vec<&str> = Vec::new();
        let mut rest = input;

        while let Some(pos) = rest.find(['<', '&']) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];

            if rest.starts_with('&') {
                let (decoded, len) = decode_entity(rest);
                out.push_str(decoded);
                rest = &rest[len..];
                continue;
            }

            let inner = match rest.find('>') {
                Some(end) if !rest[1..end].contains(['<', ' ']) => &rest[1..end],
                _ => {
                    out.push('<');
                    rest = &rest[1..];
                    continue;
                }
            };
            let end = inner.len() + 1;
            let (closing, name) = match inner.strip_prefix('/') {
                Some(n) => (true, n),
                None => (false, inner),
            };
            let name = name.to_ascii_lowercase();

            if !self.styles.contains(&name) || (closing && !open.contains(&name.as_str())) {
                out.push_str(&rest[..=end]);
                rest = &rest[end + 1..];
                continue;
            }

            if closing {
                if let Some(idx) = open.iter().rposition(|t| *t == name) {
                    open.remove(idx);
                }
                if color {
                    out.push_str(ANSI_RESET);
                    for tag in &open {
                        out.push_str(self.styles.get(tag).unwrap_or_default());
                    }
                }
            } else {
                if color {
                    out.push_str(self.styles.get(&name).unwrap_or_default());
                }
                // Borrow the key owned by the table so the stack outlives `name`.
                if let Some((key, _)) = self.styles.tags.get_key_value(&name) {
                    open.push(key.as_str());
                }
            }
            rest = &rest[end + 1..];
        }
        out.push_str(rest);

        if color && !open.is_empty() {
            out.push_str(ANSI_RESET);
        }
        out
    }
}

impl Default for Markup {
    fn default() -> Self {
        Self::server(ColorMode::Always)
    }
}

/// Encode user text so `render` prints it verbatim.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode one entity at the start of `s`, returning the text and bytes consumed.
fn decode_entity(s: &str) -> (&str, usize) {
    const ENTITIES: [(&str, &str); 4] = [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&amp;", "&"),
        ("&quot;", "\""),
    ];
    for (entity, text) in ENTITIES {
        if s.starts_with(entity) {
            return (text, entity.len());
        }
    }
    ("&", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_spec_parsing() {
        let tags = server_tags();
        assert_eq!(tags.get("error"), Some("\x1b[91;1;40m"));
        assert_eq!(tags.get("success"), Some("\x1b[92;1m"));
        assert_eq!(tags.get("cmd"), Some("\x1b[32;4m"));
        assert_eq!(tags.get("w"), Some("\x1b[35m"));
    }

    #[test]
    fn test_render_sys() {
        let m = Markup::server(ColorMode::Always);
        assert_eq!(m.sys("hi"), "\x1b[93;1mhi\x1b[0m");
    }

    #[test]
    fn test_nested_tags_reapply_outer() {
        let m = Markup::server(ColorMode::Always);
        let out = m.render("<title>a<cmd>b</cmd>c</title>");
        assert_eq!(
            out,
            "\x1b[97;1;4ma\x1b[32;4mb\x1b[0m\x1b[97;1;4mc\x1b[0m"
        );
    }

    #[test]
    fn test_plain_mode_strips_tags() {
        let m = Markup::server(ColorMode::Never);
        assert_eq!(
            m.render("<cmd>/echo</cmd> &lt;message&gt; - Echo"),
            "/echo <message> - Echo"
        );
    }

    #[test]
    fn test_unknown_tags_pass_through() {
        let m = Markup::server(ColorMode::Never);
        assert_eq!(m.render("a <b> c </ww> d"), "a <b> c </ww> d");
        assert_eq!(m.render("1 < 2 & 3"), "1 < 2 & 3");
    }

    #[test]
    fn test_entities_are_not_tags() {
        let m = Markup::server(ColorMode::Always);
        assert_eq!(m.render("&lt;sys&gt;"), "<sys>");
    }

    #[test]
    fn test_escape_round_trips_user_text() {
        let m = Markup::server(ColorMode::Always);
        let text = "<sys>a & b</sys>";
        assert_eq!(m.render(&escape(text)), text);
    }

    #[test]
    fn test_unclosed_tag_is_reset() {
        let m = Markup::server(ColorMode::Always);
        assert_eq!(m.render("<w>x"), "\x1b[35mx\x1b[0m");
    }
}
