//! Byte-slab helpers shared by the two rewriters.

/// Byte-line iterator: yields lines without their terminator plus a flag
/// telling whether a terminator was present.
pub(crate) struct Lines<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Rewind to an earlier position (used to un-read a peeked line).
    pub(crate) fn rewind(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    pub(crate) fn next_line(&mut self) -> Option<(&'a [u8], bool)> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => {
                self.pos += nl + 1;
                let mut line = &rest[..nl];
                if line.last() == Some(&b'\r') {
                    line = &line[..line.len() - 1];
                }
                Some((line, true))
            }
            None => {
                self.pos = self.buf.len();
                Some((rest, false))
            }
        }
    }
}

/// Check for a subslice anywhere in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack
            .windows(needle.len())
            .any(|window| window == needle)
}

/// Force a slab to exactly `num` bytes: pad with line feeds or truncate,
/// warning when bytes had to be cut.
pub(crate) fn fit_to_size(mut out: Vec<u8>, num: usize, dir: &str) -> Vec<u8> {
    if out.len() > num {
        tracing::warn!("{} imbalance: +{} bytes, truncating", dir, out.len() - num);
        out.truncate(num);
    } else if out.len() < num {
        out.resize(num, b'\n');
    }
    out
}
