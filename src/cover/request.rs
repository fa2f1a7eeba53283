//! Client → cover-origin request rewriting.
//!
//! Each slab of client bytes is transformed into a same-length slab for the
//! cover socket. Header lines are rewritten one by one; POST content is
//! replaced with the pre-built cover POST body while the client's real
//! upload bytes are diverted to the document sealer.

use crate::cover::slab::{contains, fit_to_size, Lines};
use crate::cover::state::{RequestMode, RequestPhase, State};
use crate::cover::Cover;
use crate::uri;

impl Cover {
    /// Transform one slab of client request data into the same-length slab
    /// sent to the cover origin.
    pub fn rewrite_request(&self, state: &mut State, data: &[u8]) -> Vec<u8> {
        let num = data.len();
        tracing::trace!("{} bytes received from client", num);

        // reuse the client's line terminator convention
        let lb: &str = if contains(data, b"\r\n") { "\r\n" } else { "\n" };

        let mut lines = Lines::new(data);
        let mut req = String::new();
        let mut has_encoding = false;
        let mut mime = "text/html".to_string();
        let mut target_host = self.host().to_string();

        while state.req.phase == RequestPhase::Header {
            let (line, terminated) = match lines.next_line() {
                Some(item) => item,
                None => break,
            };
            if line.is_empty() {
                if terminated {
                    state.req.phase = RequestPhase::HeaderDone;
                }
                break;
            }
            let line = String::from_utf8_lossy(line).into_owned();

            if let Some(rest) = line.strip_prefix("POST ") {
                // the first path segment keys the cover POST store, the
                // remainder is the real upstream path
                let path = rest.split(' ').next().unwrap_or("");
                let mut elems = path.split('/');
                let _ = elems.next();
                state.req.boundary_out = elems.next().unwrap_or("").to_string();
                let mut upstream: String =
                    elems.map(|e| format!("/{}", e)).collect();
                if upstream.is_empty() {
                    upstream.push('/');
                }
                state.req.cover_post = self.posts.take(&state.req.boundary_out);
                state.req.cover_post_pos = 0;

                let upstream = split_host(&upstream, &mut target_host);
                tracing::debug!("POST upstream resource '{}'", upstream);
                state.req.resource = upstream.clone();
                state.req.mode = RequestMode::Post;
                req.push_str(&format!("POST {} HTTP/1.0{}", upstream, lb));
            } else if let Some(rest) = line.strip_prefix("GET ") {
                let path = rest.split(' ').next().unwrap_or("");
                let translated = uri::delocalize(path);
                tracing::debug!("URI translation: '{}' => '{}'", path, translated);

                let upstream = split_host(&translated, &mut target_host);
                state.req.resource = upstream.clone();
                state.req.mode = RequestMode::Get;
                req.push_str(&format!("GET {} HTTP/1.0{}", upstream, lb));
            } else if line.starts_with("Host: ") {
                tracing::debug!("Host replaced with '{}'", target_host);
                req.push_str(&format!("Host: {}{}", target_host, lb));
            } else if let Some(value) = line.strip_prefix("Accept-Encoding: ") {
                has_encoding = true;
                if mime == "text/html" && value != "identity" {
                    // gzip or chunked content would defeat streaming rewrites
                    req.push_str(&format!("Accept-Encoding: identity{}", lb));
                } else {
                    req.push_str(&line);
                    req.push_str(lb);
                }
            } else if line.starts_with("Content-Type: ") {
                let parts: Vec<&str> = line.split(' ').collect();
                if parts.len() > 1 {
                    mime = parts[1].to_string();
                }
                if state.req.mode == RequestMode::Post && parts.len() > 2 {
                    state.req.boundary_in =
                        parts[2].strip_prefix("boundary=").unwrap_or(parts[2]).to_string();
                    tracing::debug!("client boundary '{}'", state.req.boundary_in);
                    req.push_str(&format!(
                        "Content-Type: {} boundary=---------------------------{}{}",
                        mime, state.req.boundary_out, lb
                    ));
                } else {
                    req.push_str(&line);
                    req.push_str(lb);
                }
            } else if line.starts_with("Referer: ") {
                req.push_str(&format!(
                    "Referer: {}://{}/{}",
                    self.protocol(),
                    target_host,
                    lb
                ));
            } else if let Some(value) = line.strip_prefix("Connection: ") {
                if value != "close" {
                    req.push_str(&format!("Connection: close{}", lb));
                } else {
                    req.push_str(&line);
                    req.push_str(lb);
                }
            } else if line.starts_with("Keep-Alive: ") {
                // dropped; upstream connections are one-shot
            } else if let Some(value) = line.strip_prefix("Content-Length: ") {
                if state.req.mode == RequestMode::Post {
                    let deferred = match &state.req.cover_post {
                        None => true,
                        Some(post) => post.first() == Some(&b'!'),
                    };
                    if deferred {
                        state.req.content_length = value.trim().parse().unwrap_or(0);
                        let post = (self.plugin.finalize_cover)(self, state);
                        state.req.cover_post = Some(post);
                    }
                    let len = state.req.cover_post.as_ref().map_or(0, Vec::len);
                    req.push_str(&format!("Content-Length: {}{}", len, lb));
                } else {
                    req.push_str(&line);
                    req.push_str(lb);
                }
            } else {
                req.push_str(&line);
                if terminated {
                    req.push_str(lb);
                }
            }
        }

        if state.req.phase == RequestPhase::HeaderDone {
            req.push_str(lb);
            if mime == "text/html" && !has_encoding {
                req.push_str(&format!("Accept-Encoding: identity{}", lb));
            }
            state.req.phase = if state.req.mode == RequestMode::Post {
                RequestPhase::Content
            } else {
                RequestPhase::Done
            };
        }

        if state.req.phase == RequestPhase::Content {
            self.divert_upload(state, &mut lines, lb);

            // emit the cover POST body instead of the client's content
            let mut out = req.into_bytes();
            if let Some(post) = &state.req.cover_post {
                let start = state.req.cover_post_pos;
                if start < post.len() && out.len() < num {
                    let take = (num - out.len()).min(post.len() - start);
                    out.extend_from_slice(&post[start..start + take]);
                    state.req.cover_post_pos = start + take;
                }
            }
            return fit_to_size(out, num, "request");
        }

        if state.req.phase == RequestPhase::Done {
            return fit_to_size(req.into_bytes(), num, "request");
        }

        // header fragmented across slabs: emit what was rebuilt; padding
        // here would terminate the header early
        tracing::warn!("request header fragmented");
        if req.len() != num {
            tracing::warn!("request imbalance: {} bytes", req.len() as i64 - num as i64);
        }
        req.into_bytes()
    }

    /// Scan POST content lines, accumulating the client's file part and
    /// triggering the upload handler when the terminating boundary passes.
    fn divert_upload(&self, state: &mut State, lines: &mut Lines<'_>, lb: &str) {
        while let Some((line, terminated)) = lines.next_line() {
            if !state.req.upload {
                if contains(line, b"name=\"file\";") {
                    state.req.upload = true;
                    state.req.upload_data.clear();
                }
            } else if contains(line, state.req.boundary_in.as_bytes()) {
                state.req.upload = false;
                tracing::info!(
                    "client upload complete ({} bytes)",
                    state.req.upload_data.len()
                );
                (self.upload_handler)(&state.req.upload_data);
            } else {
                state.req.upload_data.extend_from_slice(line);
                if terminated {
                    state.req.upload_data.extend_from_slice(lb.as_bytes());
                }
            }
        }
    }
}

/// Split a `<scheme>://<host>/<path>` resource into host and path,
/// updating `target_host` in place. Plain paths pass through.
fn split_host(resource: &str, target_host: &mut String) -> String {
    if let Some(pos) = resource.find("://") {
        let rem = &resource[pos + 3..];
        if let Some(slash) = rem.find('/') {
            *target_host = rem[..slash].to_string();
            tracing::debug!("URI split: '{}', '{}'", target_host, &rem[slash..]);
            return rem[slash..].to_string();
        }
        tracing::warn!("URI split failed on '{}'", resource);
    }
    resource.to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cover::Cover;

    fn test_cover() -> Cover {
        Cover::new("example.com", 80, "http", "/upload.php")
    }

    fn rewritten_lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out)
            .split("\r\n")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_get_translation() {
        let cover = test_cover();
        let mut state = State::new();
        let input = b"GET /&http/example.com/a.png HTTP/1.1\r\nHost: local\r\n\r\n";

        let out = cover.rewrite_request(&mut state, input);
        assert_eq!(out.len(), input.len());

        let lines = rewritten_lines(&out);
        assert_eq!(lines[0], "GET /a.png HTTP/1.0");
        assert_eq!(lines[1], "Host: example.com");
        assert_eq!(state.req.mode, RequestMode::Get);
        assert_eq!(state.req.phase, RequestPhase::Done);
        assert_eq!(state.req.resource, "/a.png");
    }

    #[test]
    fn test_plain_get_goes_to_cover_host() {
        let cover = test_cover();
        let mut state = State::new();
        let input = b"GET /index.html HTTP/1.1\r\nHost: local\r\nConnection: keep-alive\r\n\r\n";

        let out = cover.rewrite_request(&mut state, input);
        assert_eq!(out.len(), input.len());

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("GET /index.html HTTP/1.0"));
        assert!(text.contains("Host: example.com"));
        assert!(text.contains("Connection: close"));
    }

    #[test]
    fn test_keep_alive_dropped_and_encoding_forced() {
        let cover = test_cover();
        let mut state = State::new();
        let input = concat!(
            "GET / HTTP/1.1\r\n",
            "Host: local\r\n",
            "Keep-Alive: 300\r\n",
            "Accept-Encoding: gzip, deflate\r\n",
            "\r\n"
        )
        .as_bytes();

        let out = cover.rewrite_request(&mut state, input);
        assert_eq!(out.len(), input.len());

        let text = String::from_utf8_lossy(&out);
        assert!(!text.contains("Keep-Alive"));
        assert!(text.contains("Accept-Encoding: identity"));
    }

    #[test]
    fn test_referer_rewritten() {
        let cover = test_cover();
        let mut state = State::new();
        let input =
            b"GET / HTTP/1.1\r\nHost: local\r\nReferer: http://local/page.html\r\n\r\n";

        let out = cover.rewrite_request(&mut state, input);
        assert_eq!(out.len(), input.len());
        assert!(String::from_utf8_lossy(&out).contains("Referer: http://example.com/"));
    }

    #[test]
    fn test_post_consumes_store_and_diverts_upload() {
        let cover = test_cover();
        let post_body = plugin_body(500);
        cover.posts.put("B1aaaaaaaaaaaaaaaaaaaaaaaaaaaa", post_body.clone());

        let uploads: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&uploads);
        let cover = cover.with_upload_handler(move |data| {
            sink.lock().unwrap().push(data.to_vec());
            true
        });

        let mut state = State::new();
        let body = concat!(
            "------clientBoundary\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"doc.txt\"\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "SECRET LINE ONE\r\n",
            "SECRET LINE TWO\r\n",
            "------clientBoundary--\r\n"
        );
        let header = format!(
            concat!(
                "POST /B1aaaaaaaaaaaaaaaaaaaaaaaaaaaa/upload.php HTTP/1.1\r\n",
                "Host: local\r\n",
                "Content-Type: multipart/form-data; boundary=----clientBoundary\r\n",
                "Content-Length: {}\r\n",
                "\r\n"
            ),
            body.len()
        );
        let input = format!("{}{}", header, body);

        let out = cover.rewrite_request(&mut state, input.as_bytes());
        assert_eq!(out.len(), input.len());

        // store entry is single-use
        assert!(cover.posts.take("B1aaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_none());

        // upstream header carries the outgoing boundary and cover length
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("POST /upload.php HTTP/1.0\r\n"));
        assert!(text.contains(
            "Content-Type: multipart/form-data; boundary=---------------------------B1aaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        ));
        assert!(text.contains(&format!("Content-Length: {}", post_body.len())));

        // the sealed document is exactly the bytes between the file part
        // header and the closing boundary
        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(
            String::from_utf8_lossy(&uploads[0]),
            "Content-Type: text/plain\r\n\r\nSECRET LINE ONE\r\nSECRET LINE TWO\r\n"
        );

        // cover body flowed into the output after the header
        assert!(state.req.cover_post_pos > 0);
        assert_eq!(state.req.mode, RequestMode::Post);
        assert_eq!(state.req.phase, RequestPhase::Content);
    }

    #[test]
    fn test_cover_post_cursor_advances_across_slabs() {
        let cover = test_cover();
        cover.posts.put("Kaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", plugin_body(2000));

        let mut state = State::new();
        let first_slab = format!(
            concat!(
                "POST /Kaaaaaaaaaaaaaaaaaaaaaaaaaaaaa/up HTTP/1.1\r\n",
                "Host: local\r\n",
                "Content-Type: multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW9\r\n",
                "Content-Length: 2000\r\n",
                "\r\n",
                "{}"
            ),
            "x".repeat(300)
        );
        let out = cover.rewrite_request(&mut state, first_slab.as_bytes());
        assert_eq!(out.len(), first_slab.len());
        let first_pos = state.req.cover_post_pos;
        assert!(first_pos > 0);
        assert!(first_pos <= 1400);

        let slab = vec![b'x'; 600];
        let out = cover.rewrite_request(&mut state, &slab);
        assert_eq!(out.len(), 600);
        assert_eq!(state.req.cover_post_pos, first_pos + 600);

        // exhaust the body; tail slabs are padded with line feeds
        let slab = vec![b'x'; 4096];
        let out = cover.rewrite_request(&mut state, &slab);
        assert_eq!(out.len(), 4096);
        assert_eq!(state.req.cover_post_pos, 2000);
        assert!(out.ends_with(b"\n"));
    }

    #[test]
    fn test_phase_never_regresses() {
        let cover = test_cover();
        let mut state = State::new();

        let out = cover.rewrite_request(&mut state, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(out.len(), 18);
        assert_eq!(state.req.phase, RequestPhase::Done);

        // further slabs keep the terminal phase
        let out = cover.rewrite_request(&mut state, b"stray");
        assert_eq!(out.len(), 5);
        assert_eq!(state.req.phase, RequestPhase::Done);
    }

    fn plugin_body(len: usize) -> Vec<u8> {
        crate::cover::multipart_body(
            "B1",
            "img.gif",
            "image/gif",
            "",
            b"GIF89a",
            Some(len),
        )
    }
}
