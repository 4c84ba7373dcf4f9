use serde_yaml::{Mapping, Value};

use crate::parse::{Line, lines};

/// A `---` delimited metadata block at the top of a task file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter<'a> {
    /// The raw block, delimiters and the closing line break included.
    pub block: &'a str,
    /// Top-level keys in file order.
    pub fields: Vec<Field<'a>>,
    /// Everything after the block.
    pub body: &'a str,
    /// False when the closing delimiter was never found.
    pub terminated: bool,
    /// Set when the block is not a YAML mapping. Field values then come
    /// from the raw lines.
    pub yaml_error: Option<String>,
}

impl<'a> FrontMatter<'a> {
    /// First field named `key`; later duplicates are ignored.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Field<'a>> {
        self.fields.iter().find(|field| field.key == key)
    }
}

/// One top-level metadata key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<'a> {
    /// Lowercased key.
    pub key: String,
    /// Scalar value as read; `None` for lists and nested mappings.
    pub value: Option<String>,
    /// The key line plus any indented lines under it, without the final
    /// terminator.
    pub raw: &'a str,
}

impl Field<'_> {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Split front matter off `content`.
///
/// Returns `None` when the first line is not `---`. Only column-0
/// `key: value` lines are fields; indented lines and `- item` lines belong to
/// the key above them. Values are read with `serde_yaml`. Plain scalars YAML
/// would turn into numbers, booleans or null keep their written text, so
/// `id: 01` stays `01`.
#[must_use]
pub fn split_front_matter(content: &str) -> Option<FrontMatter<'_>> {
    let mut iter = lines(content);
    let first = iter.next()?;
    if first.text.trim_end() != "---" {
        return None;
    }
    let inner_start = first.full.len();

    let mut inner: Vec<Line<'_>> = Vec::new();
    let mut closing = None;
    for line in iter {
        let trimmed = line.text.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closing = Some(line);
            break;
        }
        inner.push(line);
    }

    let (block, body, yaml) = closing.map_or(
        (content, "", &content[inner_start..]),
        |line| {
            let end = line.start + line.full.len();
            (&content[..end], &content[end..], &content[inner_start..line.start])
        },
    );

    let (mapping, yaml_error) = match parse_mapping(yaml) {
        Ok(mapping) => (Some(mapping), None),
        Err(err) => (None, Some(err)),
    };

    let fields = top_level_fields(content, &inner)
        .into_iter()
        .map(|(key, inline, raw)| Field {
            key: key.to_ascii_lowercase(),
            value: field_value(mapping.as_ref(), key, inline),
            raw,
        })
        .collect();

    Some(FrontMatter {
        block,
        fields,
        body,
        terminated: closing.is_some(),
        yaml_error,
    })
}

/// Text to write after `key: ` so that reading it back yields `value`.
///
/// Plain text is written as is. Anything YAML would read differently (a
/// colon followed by a space, surrounding quotes, a ` #` comment, flow
/// brackets) is written as a double-quoted scalar.
#[must_use]
pub fn render_value(value: &str) -> String {
    if reads_back_plain(value) {
        value.to_string()
    } else {
        double_quote(value)
    }
}

fn reads_back_plain(value: &str) -> bool {
    if value.is_empty() || value != value.trim() {
        return false;
    }
    let Ok(mapping) = parse_mapping(&format!("v: {value}")) else {
        return false;
    };
    mapping.get("v").is_some_and(|parsed| match parsed {
        Value::String(text) => text == value,
        Value::Null | Value::Bool(_) | Value::Number(_) => strip_comment(value) == value,
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => false,
    })
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn parse_mapping(yaml: &str) -> Result<Mapping, String> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err("front matter is not a key/value mapping".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn field_value(mapping: Option<&Mapping>, key: &str, inline: &str) -> Option<String> {
    let Some(mapping) = mapping else {
        return Some(unquote(inline.trim()).to_string());
    };
    mapping.get(key).map_or_else(
        || Some(strip_comment(inline).to_string()),
        |value| scalar_text(value, inline),
    )
}

fn scalar_text(value: &Value, inline: &str) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null | Value::Bool(_) | Value::Number(_) => Some(strip_comment(inline).to_string()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// `(key, inline value, raw span)` for every column-0 key of the block.
fn top_level_fields<'a>(
    content: &'a str,
    inner: &[Line<'a>],
) -> Vec<(&'a str, &'a str, &'a str)> {
    let mut fields = Vec::new();
    let mut i = 0;
    while i < inner.len() {
        let line = inner[i];
        let Some((key, inline)) = top_level_key(line.text) else {
            i += 1;
            continue;
        };

        let mut last = i;
        for (j, next) in inner.iter().enumerate().skip(i + 1) {
            if is_continuation(next.text) {
                last = j;
            } else if !next.text.trim().is_empty() {
                break;
            }
        }

        let end = inner[last].start + inner[last].text.len();
        fields.push((key, inline, &content[line.start..end]));
        i = last + 1;
    }
    fields
}

fn top_level_key(line: &str) -> Option<(&str, &str)> {
    if line.starts_with([' ', '\t', '#', '-']) {
        return None;
    }
    let (key, inline) = line.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    if !(inline.is_empty() || inline.starts_with([' ', '\t'])) {
        return None;
    }
    Some((key, inline))
}

/// Indented lines and column-0 list items belong to the key above.
fn is_continuation(line: &str) -> bool {
    (line.starts_with([' ', '\t']) && !line.trim().is_empty()) || line.starts_with("- ")
}

fn strip_comment(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('#') {
        return "";
    }
    text.find(" #").map_or(text, |pos| text[..pos].trim_end())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
