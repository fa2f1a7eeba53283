//! Tag value objects.
//!
//! A [`Tag`] captures one HTML tag from a cover response that refers to an
//! external resource and therefore has to be conserved and translated so
//! the client's fetch pattern matches a genuine visit. A [`TagList`] keeps
//! such tags in source order.

use std::fmt;

/// A parsed HTML tag: name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Tag {
    /// Create a new tag with the given name and attribute list.
    pub fn new(name: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attrs,
        }
    }

    /// Get the tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place or appending.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }
}

impl fmt::Display for Tag {
    /// Serialize the tag as markup.
    ///
    /// `script` tags are re-emitted with an explicit closing tag; browsers
    /// ignore self-closing script elements.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, val) in &self.attrs {
            write!(f, " {}=\"{}\"", key, escape_attr(val))?;
        }
        if self.name == "script" {
            write!(f, "></script>")
        } else {
            write!(f, "/>")
        }
    }
}

/// Escape an attribute value for re-emission.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// FIFO queue of tags, in source order.
#[derive(Debug, Default)]
pub struct TagList {
    list: Vec<Tag>,
}

impl TagList {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag at the back.
    pub fn put(&mut self, tag: Tag) {
        self.list.push(tag);
    }

    /// Push a tag back to the front (it will be returned by the next `get`).
    pub fn put_front(&mut self, tag: Tag) {
        self.list.insert(0, tag);
    }

    /// Pop the next tag from the front, `None` if the list is empty.
    pub fn get(&mut self) -> Option<Tag> {
        if self.list.is_empty() {
            None
        } else {
            Some(self.list.remove(0))
        }
    }

    /// Number of tags in the list.
    pub fn count(&self) -> usize {
        self.list.len()
    }

    /// All tags carrying the named attribute.
    pub fn lookup(&self, attr: &str) -> Vec<&Tag> {
        self.list.iter().filter(|t| t.attr(attr).is_some()).collect()
    }

    /// All tags where the named attribute has the given value.
    pub fn lookup_pair(&self, attr: &str, value: &str) -> Vec<&Tag> {
        self.list
            .iter()
            .filter(|t| t.attr(attr) == Some(value))
            .collect()
    }
}
