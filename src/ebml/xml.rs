use super::{SchemaElement, ValueKind};
use crate::Result;

/// Options of the XML dump.
#[derive(Debug, Clone)]
pub struct XmlOptions {
    /// Indentation of one nesting step.
    pub indent: String,

    /// Elements deeper than this are not expanded (the root is at depth 0).
    pub max_depth: Option<usize>,
}
impl Default for XmlOptions {
    fn default() -> Self {
        XmlOptions {
            indent: "  ".to_owned(),
            max_depth: None,
        }
    }
}

impl SchemaElement {
    /// Renders the element and its visited subtree as XML.
    ///
    /// Only the elements that are rendered get read.
    pub fn to_xml(&self, options: &XmlOptions) -> Result<String> {
        let mut lines = Vec::new();
        track!(self.to_xml_lines(options, 0, &mut lines))?;
        Ok(lines.join("\n"))
    }

    pub(crate) fn to_xml_lines(
        &self,
        options: &XmlOptions,
        depth: usize,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        let indent = options.indent.repeat(depth);
        let name = self.name();
        let line = match self.spec().value {
            ValueKind::Master => {
                if options.max_depth.map_or(false, |max| depth >= max) {
                    format!("{}<{} size=\"{}\" />", indent, name, self.data().len())
                } else {
                    lines.push(format!("{}<{}>", indent, name));
                    for child in track!(self.children())? {
                        let child = track!(child)?;
                        track!(child.to_xml_lines(options, depth + 1, lines))?;
                    }
                    format!("{}</{}>", indent, name)
                }
            }
            ValueKind::Uint => format!("{}<{}>{}</{}>", indent, name, track!(self.read_uint())?, name),
            ValueKind::Int | ValueKind::Date => {
                format!("{}<{}>{}</{}>", indent, name, track!(self.read_int())?, name)
            }
            ValueKind::Float => format!("{}<{}>{}</{}>", indent, name, track!(self.read_float())?, name),
            ValueKind::Utf8 => {
                let text = escape(&track!(self.read_utf8())?);
                format!("{}<{}>{}</{}>", indent, name, text, name)
            }
            ValueKind::VarInt => {
                let v = track!(self.read_varint())?;
                format!("{}<{}>0x{:X}</{}>", indent, name, v.id(), name)
            }
            ValueKind::Enum(_) => match self.read_enum() {
                Ok(symbol) => format!("{}<{}>{}</{}>", indent, name, symbol, name),
                Err(_) => format!("{}<{}>{}</{}>", indent, name, track!(self.read_uint())?, name),
            },
            ValueKind::Unknown => format!(
                "{}<{} id=\"0x{:X}\" size=\"{}\" dataSize=\"{}\" />",
                indent,
                name,
                self.id(),
                self.size(),
                self.data().len()
            ),
            ValueKind::Bytes | ValueKind::Block | ValueKind::Void | ValueKind::Crc32 => format!(
                "{}<{} size=\"{}\" dataSize=\"{}\" />",
                indent,
                name,
                self.size(),
                self.data().len()
            ),
        };
        lines.push(line);
        Ok(())
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c if c.is_control() => escaped.push_str(&format!("&#x{:X};", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b & \"c\">"), "a&lt;b &amp; &quot;c&quot;&gt;");
        assert_eq!(escape("tab\there"), "tab&#x9;here");
    }
}
