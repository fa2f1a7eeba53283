//! Cover-origin → client response rewriting.
//!
//! The response header is parsed and re-emitted with translated links. HTML
//! bodies are replaced entirely: the real markup is scanned for external
//! resource tags, and a synthetic body of exactly the same size is emitted
//! that references the same resources through translated URIs. Scripts and
//! style sheets are scrubbed, images pass through.

use crate::cover::slab::{contains, fit_to_size, Lines};
use crate::cover::state::{ResponsePhase, State};
use crate::cover::Cover;
use crate::html::{self, padding, scan_fragment, HTML_INTRO, HTML_OUTRO};
use crate::uri;

impl Cover {
    /// Transform one slab of cover response data into the same-length slab
    /// sent to the client.
    pub fn rewrite_response(&self, state: &mut State, data: &[u8]) -> Vec<u8> {
        let num = data.len();
        tracing::trace!("{} bytes received from cover server", num);

        // a non-200 status switched this connection to raw relaying
        if state.resp.raw {
            return data.to_vec();
        }

        let mut resp = String::new();
        let mut lines = Lines::new(data);

        if state.resp.phase == ResponsePhase::Header {
            let lb: &str = if contains(data, b"\r\n") { "\r\n" } else { "\n" };
            loop {
                let mark = lines.pos();
                let (line, terminated) = match lines.next_line() {
                    Some(item) => item,
                    None => {
                        // header incomplete: wait for the next fragment
                        tracing::warn!("response header fragmented");
                        return resp.into_bytes();
                    }
                };
                if !terminated {
                    tracing::warn!("response header fragmented");
                    return resp.into_bytes();
                }
                if line.starts_with(b"<!") {
                    // no header at all; everything is body
                    tracing::info!("no response header found");
                    lines.rewind(mark);
                    break;
                }
                if line.is_empty() {
                    resp.push_str(lb);
                    break;
                }
                let mut line = String::from_utf8_lossy(line).into_owned();

                if let Some(rest) = line.strip_prefix("HTTP/") {
                    let status: u32 = rest
                        .split(' ')
                        .nth(1)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                    tracing::debug!("response status: {}", status);
                    if status != 200 {
                        state.resp.raw = true;
                        return data.to_vec();
                    }
                } else if let Some(value) = line.strip_prefix("Content-Type: ") {
                    state.resp.mime = value
                        .split(' ')
                        .next()
                        .unwrap_or(value)
                        .trim_end_matches(';')
                        .to_string();
                    tracing::debug!("response type: {}", state.resp.mime);
                } else if let Some(value) = line.strip_prefix("Content-Encoding: ") {
                    state.resp.encoding = value.to_string();
                    tracing::debug!("response encoding: {}", state.resp.encoding);
                } else if let Some(value) = line.strip_prefix("location: ") {
                    line = format!("location: {}", uri::localize(value));
                    tracing::debug!("changing location => {}", line);
                }
                resp.push_str(&line);
                resp.push_str(lb);
            }

            // first packet of an HTML response: fetch the replacement page
            if state.resp.mime.starts_with("text/html") {
                let (pending, cover_id) = (self.plugin.handle_request)(self, state);
                state.resp.pending = pending;
                state.data.insert("CoverId".to_string(), cover_id);
            }
            state.resp.phase = ResponsePhase::Head;
        }

        let body = &data[lines.pos()..];
        let budget = num.saturating_sub(resp.len());

        if state.resp.mime.starts_with("text/html") {
            let fragment = String::from_utf8_lossy(body);
            let done = scan_fragment(
                &fragment,
                &mut state.resp.open_elems,
                &mut state.resp.hdr,
                &mut state.resp.tags,
                &mut state.resp.xtra,
            );
            if done {
                // give the plugin a chance to align the replacement page
                // with what the real page contained
                (self.plugin.sync_cover)(self, state);
            }

            let mut budget = budget;
            if state.resp.phase == ResponsePhase::Head && state.resp.hdr.count() > 0 {
                let head = assemble_head(&mut state.resp.hdr, budget);
                budget = budget.saturating_sub(head.len());
                resp.push_str(&head);
                state.resp.phase = ResponsePhase::Body;
            }
            resp.push_str(&assemble_body(state, budget, done));

            tracing::trace!("translated response:\n{}", resp);
            return fit_to_size(resp.into_bytes(), num, "response");
        }

        if state.resp.mime.starts_with("image/") {
            // images are considered harmless
            tracing::debug!("image data passed to client");
            return data.to_vec();
        }

        if state.resp.mime.starts_with("application/x-javascript") {
            // looks like the client browser has JavaScript disabled
            tracing::debug!("JavaScript scrubbed");
            let mut out = resp.into_bytes();
            out.resize(out.len() + budget, b' ');
            return fit_to_size(out, num, "response");
        }

        if state.resp.mime.starts_with("text/css") {
            // no image references inside CSS are followed; to an observer
            // those look like cached resources
            tracing::debug!("CSS scrubbed");
            let mut out = resp.into_bytes();
            out.resize(out.len() + budget, b' ');
            return fit_to_size(out, num, "response");
        }

        tracing::warn!("unhandled response type '{}'", state.resp.mime);
        data.to_vec()
    }
}

/// Assemble the synthesized `<head>` section from collected link tags.
///
/// Tags that do not fit into the budget are pushed back for a later slab.
fn assemble_head(tags: &mut crate::html::TagList, budget: usize) -> String {
    let mut head = String::from("<head>\n");
    let mut size = budget.saturating_sub(head.len() + "</head>\n".len());
    while let Some(mut tag) = tags.get() {
        let inline = format!("{}\n", translate_tag(&mut tag));
        if inline.len() < size {
            head.push_str(&inline);
            size -= inline.len();
        } else {
            tracing::warn!("can't add all header tags: {} deferred", tags.count() + 1);
            tags.put_front(tag);
            break;
        }
    }
    head.push_str("</head>\n");
    head
}

/// Assemble the synthesized HTML body: intro, pending replacement page,
/// collected resource tags, outro, padded to exactly `budget` bytes.
fn assemble_body(state: &mut State, budget: usize, done: bool) -> String {
    let mut out = String::new();
    let mut size = budget;

    if !state.resp.intro_sent {
        if HTML_INTRO.len() > size {
            out.push_str(&padding(size));
            return out;
        }
        out.push_str(HTML_INTRO);
        size -= HTML_INTRO.len();
        state.resp.intro_sent = true;
    }

    // replacement page first; an oversized remainder is carried over
    let pending = std::mem::take(&mut state.resp.pending);
    if !pending.is_empty() {
        tracing::trace!("assemble_body ({}) -- {} pending", size, pending.len());
        if pending.len() > size {
            let cut = floor_char_boundary(&pending, size);
            out.push_str(&pending[..cut]);
            state.resp.pending = pending[cut..].to_string();
            size -= cut;
        } else {
            size -= pending.len();
            out.push_str(&pending);
        }
    }

    // resource tags in source order, as many as fit
    while let Some(mut tag) = state.resp.tags.get() {
        let inline = translate_tag(&mut tag);
        if inline.len() < size {
            out.push_str(&inline);
            size -= inline.len();
        } else {
            state.resp.tags.put_front(tag);
            break;
        }
    }

    if done && HTML_OUTRO.len() <= size {
        out.push_str(HTML_OUTRO);
        size -= HTML_OUTRO.len();
    }

    out.push_str(&padding(size));
    out
}

/// Translate the resource reference of a tag and serialize it.
///
/// URI translation is idempotent, so a tag deferred and re-translated on a
/// later slab comes out unchanged.
pub(crate) fn translate_tag(tag: &mut html::Tag) -> String {
    if let Some(src) = tag.attr("src").map(str::to_string) {
        let local = uri::localize(&src);
        tracing::debug!("URI translation of '{}' => '{}'", src, local);
        tag.set_attr("src", local);
    } else if let Some(href) = tag.attr("href").map(str::to_string) {
        let local = uri::localize(&href);
        tracing::debug!("URI translation of '{}' => '{}'", href, local);
        tag.set_attr("href", local);
    } else {
        tracing::error!("tag translation failed: {}", tag);
    }
    tag.to_string()
}

/// Largest index `<= max` that is a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut idx = max.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
