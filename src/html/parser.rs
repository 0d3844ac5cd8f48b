//! Lenient HTML parser producing a [`Document`].
//!
//! Handles what build-output entry documents contain: doctype, comments,
//! elements with quoted/unquoted/bare attributes, void elements and raw-text
//! elements. Unclosed elements are closed at end of input and stray end tags
//! are ignored, as browsers do. Constructs that cannot be delimited at all
//! (an unterminated tag, comment or `<script>`) are parse errors.

use std::sync::OnceLock;

use regex::Regex;

use crate::html::dom::{decode_entities, is_void_element, Attribute, Document, NodeId};
use crate::BuildError;

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

fn start_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<([A-Za-z][^\s/>]*)").expect("static regex"))
}

fn end_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^</([A-Za-z][^\s/>]*)[^>]*>").expect("static regex"))
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("static regex")
    })
}

/// Parse HTML text into a document tree.
pub fn parse(input: &str) -> Result<Document, BuildError> {
    Parser::new(input).run()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    doc: Document,
    open: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            doc: Document::new(),
            open: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn current_parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(Document::ROOT)
    }

    fn error(&self, at: usize, message: impl Into<String>) -> BuildError {
        let line = self.input[..at].matches('\n').count() + 1;
        BuildError::HtmlParse {
            line,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Document, BuildError> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.declaration()?;
            } else if start_tag_regex().is_match(rest) {
                self.start_tag()?;
            } else {
                self.text();
            }
        }
        Ok(self.doc)
    }

    fn append(&mut self, child: NodeId) {
        let parent = self.current_parent();
        self.doc.append_child(parent, child);
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A `<` that opens nothing is literal text.
        let skip = usize::from(rest.starts_with('<'));
        let len = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
        let text = &rest[..len];
        self.pos += len;

        let parent = self.current_parent();
        let last = self.doc.children(parent).last().copied();
        if let Some(existing) = last.and_then(|id| self.doc.text_mut(id)) {
            existing.push_str(text);
            return;
        }
        let id = self.doc.create_text(text);
        self.append(id);
    }

    fn comment(&mut self) -> Result<(), BuildError> {
        let start = self.pos;
        let body = &self.rest()[4..];
        // `<!-->` and `<!--->` close abruptly as empty comments.
        if let Some(abrupt) = [">", "->"].iter().find(|close| body.starts_with(**close)) {
            let id = self.doc.create_comment("");
            self.append(id);
            self.pos += 4 + abrupt.len();
            return Ok(());
        }
        let end = body
            .find("-->")
            .ok_or_else(|| self.error(start, "unterminated comment"))?;
        let id = self.doc.create_comment(&body[..end]);
        self.append(id);
        self.pos += 4 + end + 3;
        Ok(())
    }

    fn declaration(&mut self) -> Result<(), BuildError> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest
            .find('>')
            .ok_or_else(|| self.error(start, "unterminated declaration"))?;
        let inner = &rest[2..end];
        let id = if rest.starts_with("<?") {
            self.doc.create_comment(format!("?{inner}"))
        } else {
            self.doc.create_doctype(inner)
        };
        self.append(id);
        self.pos += end + 1;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), BuildError> {
        let start = self.pos;
        let rest = self.rest();
        let Some(caps) = end_tag_regex().captures(rest) else {
            // `</>` or `</ ...>`: skip up to `>`.
            let end = rest
                .find('>')
                .ok_or_else(|| self.error(start, "unterminated end tag"))?;
            self.pos += end + 1;
            return Ok(());
        };
        let whole = caps.get(0).map_or(0, |m| m.end());
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        self.pos += whole;

        let matching = self.open.iter().rposition(|&id| {
            self.doc.element(id).is_some_and(|el| el.name == name)
        });
        if let Some(index) = matching {
            self.open.truncate(index);
        }
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), BuildError> {
        let start = self.pos;
        let rest = self.rest();
        let caps = start_tag_regex()
            .captures(rest)
            .ok_or_else(|| self.error(start, "malformed start tag"))?;
        let name_match = caps.get(1).map_or("", |m| m.as_str());
        let name = name_match.to_ascii_lowercase();
        let mut cursor = 1 + name_match.len();
        let mut attrs: Vec<Attribute> = Vec::new();
        let self_closing;

        loop {
            let tail = &rest[cursor..];
            let trimmed = tail.trim_start();
            cursor += tail.len() - trimmed.len();
            if trimmed.is_empty() {
                return Err(self.error(start, format!("unterminated <{name}> tag")));
            }
            if trimmed.starts_with("/>") {
                cursor += 2;
                self_closing = true;
                break;
            }
            if trimmed.starts_with('>') {
                cursor += 1;
                self_closing = false;
                break;
            }
            match attribute_regex().captures(trimmed) {
                Some(attr) => {
                    let consumed = attr.get(0).map_or(0, |m| m.end());
                    let attr_name = attr.get(1).map_or("", |m| m.as_str());
                    let value = attr
                        .get(2)
                        .or_else(|| attr.get(3))
                        .or_else(|| attr.get(4))
                        .map(|m| decode_entities(m.as_str()));
                    if !attrs.iter().any(|a| a.name.eq_ignore_ascii_case(attr_name)) {
                        attrs.push(Attribute {
                            name: attr_name.to_string(),
                            value,
                        });
                    }
                    cursor += consumed.max(1);
                }
                // Stray character such as a lone `/` or quote.
                None => cursor += trimmed.chars().next().map_or(1, char::len_utf8),
            }
        }

        self.pos += cursor;
        let id = self.doc.create_element(&name);
        if let Some(el) = self.doc.element_mut(id) {
            el.attrs = attrs;
        }
        self.append(id);

        if self_closing || is_void_element(&name) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            return self.raw_text(id, &name, start);
        }
        self.open.push(id);
        Ok(())
    }

    fn raw_text(&mut self, element: NodeId, name: &str, start: usize) -> Result<(), BuildError> {
        let rest = self.rest();
        let needle = format!("</{name}");
        let end = rest
            .to_ascii_lowercase()
            .find(&needle)
            .ok_or_else(|| self.error(start, format!("unterminated <{name}> element")))?;
        if end > 0 {
            let text = self.doc.create_text(&rest[..end]);
            self.doc.append_child(element, text);
        }
        let close = rest[end..]
            .find('>')
            .ok_or_else(|| self.error(start, format!("unterminated </{name}> tag")))?;
        self.pos += end + close + 1;
        Ok(())
    }
}
