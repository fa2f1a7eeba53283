//! Streaming HTML scanning.
//!
//! Cover responses are not guaranteed to be well-formed HTML and arrive in
//! arbitrary fragments, so scanning has to be tolerant: a tag cut off at
//! the end of a fragment is dropped and scanning resumes with the next
//! fragment (to an eavesdropper a dropped resource looks like a cached
//! one). The scanner collects every tag that would make the client fetch
//! an external resource, classified into header links, body resources and
//! hidden input fields.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

use crate::html::tag::{Tag, TagList};

/// Fixed preamble of every synthesized HTML body.
pub const HTML_INTRO: &str = "<!DOCTYPE HTML>\n<html>\n";

/// Fixed closing of every synthesized HTML body.
pub const HTML_OUTRO: &str = "</body>\n</html>\n";

/// Destination lists for one scan pass.
struct ScanSink<'a> {
    stack: &'a mut Vec<String>,
    hdr: &'a mut TagList,
    body: &'a mut TagList,
    xtra: &'a mut TagList,
    closed: bool,
}

impl ScanSink<'_> {
    /// Route an interesting tag to its list; everything else is discarded.
    fn classify(&mut self, raw: &html5ever::tokenizer::Tag) {
        let name: &str = &raw.name;
        let attrs = || {
            raw.attrs
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect::<Vec<_>>()
        };
        match name {
            "img" => {
                // shrink to a tracking pixel; the fetch is what matters
                let mut tag = Tag::new("img", attrs());
                tag.set_attr("width", "1");
                tag.set_attr("height", "1");
                tracing::debug!("body tag: {}", tag);
                self.body.put(tag);
            }
            "script" => {
                let tag = Tag::new("script", attrs());
                if tag.attr("src").is_some() {
                    tracing::debug!("body tag: {}", tag);
                    self.body.put(tag);
                }
            }
            "link" => {
                let tag = Tag::new("link", attrs());
                if tag.attr("href").is_some() {
                    tracing::debug!("header tag: {}", tag);
                    self.hdr.put(tag);
                }
            }
            "input" => {
                let tag = Tag::new("input", attrs());
                if tag.attr("type") == Some("hidden") {
                    tracing::debug!("extra tag: {}", tag);
                    self.xtra.put(tag);
                }
            }
            _ => {}
        }
    }
}

impl TokenSink for ScanSink<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(raw) = token {
            match raw.kind {
                TagKind::StartTag => {
                    self.classify(&raw);
                    if !raw.self_closing {
                        self.stack.push(raw.name.to_string());
                    }
                }
                TagKind::EndTag => {
                    let name: &str = &raw.name;
                    if self.stack.last().map(String::as_str) == Some(name) {
                        self.stack.pop();
                    }
                    if name == "html" {
                        self.closed = true;
                    }
                }
            }
        }
        TokenSinkResult::Continue
    }
}

/// Scan one fragment of a streamed HTML body.
///
/// `stack` carries the open-element stack across fragments. Returns `true`
/// once the closing `</html>` has been observed.
pub fn scan_fragment(
    fragment: &str,
    stack: &mut Vec<String>,
    hdr: &mut TagList,
    body: &mut TagList,
    xtra: &mut TagList,
) -> bool {
    let sink = ScanSink {
        stack,
        hdr,
        body,
        xtra,
        closed: false,
    };
    let mut tok = Tokenizer::new(sink, TokenizerOpts::default());
    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(fragment));
    let _ = tok.feed(&mut input);
    // terminate this pass; a tag cut off mid-fragment is dropped here
    tok.end();
    tok.sink.closed
}

/// Generate a padding sequence of exactly `size` bytes.
///
/// Short runs are plain spaces; anything longer is wrapped into an HTML
/// comment so the filler does not render.
pub fn padding(size: usize) -> String {
    if size < 9 {
        " ".repeat(size)
    } else {
        format!("<!-- {} -->", "?".repeat(size - 9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(fragment: &str) -> (Vec<String>, TagList, TagList, TagList, bool) {
        let mut stack = Vec::new();
        let mut hdr = TagList::new();
        let mut body = TagList::new();
        let mut xtra = TagList::new();
        let closed = scan_fragment(fragment, &mut stack, &mut hdr, &mut body, &mut xtra);
        (stack, hdr, body, xtra, closed)
    }

    #[test]
    fn test_classification() {
        let page = concat!(
            "<html><head><link href=\"http://x/y.css\" rel=\"stylesheet\"/>",
            "<script src=\"http://x/a.js\"></script></head>",
            "<body><img src=\"http://x/z.png\" width=\"640\" height=\"480\"/>",
            "<input type=\"hidden\" name=\"token\" value=\"q\"/>",
            "<input type=\"text\" name=\"user\"/>",
            "<div class=\"ignored\"></div></body></html>",
        );
        let (_, mut hdr, mut body, mut xtra, closed) = scan(page);
        assert!(closed);

        assert_eq!(hdr.count(), 1);
        assert_eq!(hdr.get().unwrap().name(), "link");

        assert_eq!(body.count(), 2);
        let script = body.get().unwrap();
        assert_eq!(script.name(), "script");
        let img = body.get().unwrap();
        assert_eq!(img.attr("width"), Some("1"));
        assert_eq!(img.attr("height"), Some("1"));

        assert_eq!(xtra.count(), 1);
        assert_eq!(xtra.get().unwrap().attr("name"), Some("token"));
    }

    #[test]
    fn test_script_without_src_discarded() {
        let (_, _, mut body, _, _) = scan("<script>var x = 1;</script>");
        assert!(body.get().is_none());
    }

    #[test]
    fn test_incomplete_document_not_closed() {
        let (stack, _, mut body, _, closed) =
            scan("<html><body><img src=\"/a.png\"/>");
        assert!(!closed);
        assert_eq!(body.count(), 1);
        assert!(stack.contains(&"html".to_string()));
        let _ = body.get();
    }

    #[test]
    fn test_fragmented_tag_dropped() {
        let mut stack = Vec::new();
        let mut hdr = TagList::new();
        let mut body = TagList::new();
        let mut xtra = TagList::new();

        // tag split across fragments: the torso is dropped, later complete
        // tags still scan
        let closed = scan_fragment(
            "<body><img src=\"/one.p",
            &mut stack,
            &mut hdr,
            &mut body,
            &mut xtra,
        );
        assert!(!closed);
        assert_eq!(body.count(), 0);

        let closed = scan_fragment(
            "<img src=\"/two.png\"/></body></html>",
            &mut stack,
            &mut hdr,
            &mut body,
            &mut xtra,
        );
        assert!(closed);
        assert_eq!(body.count(), 1);
        assert_eq!(body.get().unwrap().attr("src"), Some("/two.png"));
    }

    #[test]
    fn test_stack_spans_fragments() {
        let mut stack = Vec::new();
        let mut hdr = TagList::new();
        let mut body = TagList::new();
        let mut xtra = TagList::new();

        assert!(!scan_fragment("<html><body>", &mut stack, &mut hdr, &mut body, &mut xtra));
        assert!(scan_fragment("</body></html>", &mut stack, &mut hdr, &mut body, &mut xtra));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_padding_sizes() {
        assert_eq!(padding(0), "");
        assert_eq!(padding(4), "    ");
        assert_eq!(padding(8).len(), 8);
        let p = padding(9);
        assert_eq!(p, "<!--  -->");
        for n in [9usize, 10, 64, 1000] {
            let p = padding(n);
            assert_eq!(p.len(), n);
            assert!(p.starts_with("<!-- "));
            assert!(p.ends_with(" -->"));
        }
    }
}
