//! Cover customization hooks.
//!
//! Every cover site needs three site-specific decisions: which replacement
//! page to serve for a given request, how to reconcile that page with the
//! tags discovered in the real response, and how to produce the final
//! upstream POST body once the client's content length is known. These are
//! injected as three operations at startup.

use std::sync::Arc;

use super::images::ImageStore;
use super::{form, Cover};
use crate::cover::state::State;
use crate::util::create_key;

/// Serve the replacement HTML for the current request.
///
/// Returns the page markup and the cover id (boundary id) associated with
/// any upload form embedded in it, or an empty id.
pub type HandleRequest = Box<dyn Fn(&Cover, &mut State) -> (String, String) + Send + Sync>;

/// Reconcile the replacement content with the tags discovered in the fully
/// parsed cover response.
pub type SyncCover = Box<dyn Fn(&Cover, &mut State) + Send + Sync>;

/// Produce the upstream POST body for the client's declared content length.
pub type FinalizeCover = Box<dyn Fn(&Cover, &mut State) -> Vec<u8> + Send + Sync>;

/// The three injected cover operations.
pub struct Plugin {
    /// Replacement-page hook
    pub handle_request: HandleRequest,
    /// Tag-synchronization hook
    pub sync_cover: SyncCover,
    /// POST finalization hook
    pub finalize_cover: FinalizeCover,
}

impl Plugin {
    /// A plugin that serves configured replacement pages verbatim and never
    /// builds cover uploads. Suitable for browse-only covers and tests.
    pub fn passive() -> Self {
        Self {
            handle_request: Box::new(|cover, state| {
                let page = cover.page(&state.req.resource).unwrap_or_default();
                (page, String::new())
            }),
            sync_cover: Box::new(|_, _| {}),
            finalize_cover: Box::new(|_, _| Vec::new()),
        }
    }
}

/// Length of generated boundary ids.
const BOUNDARY_LEN: usize = 30;

/// Extra bytes the client POST carries over the cover POST (request-line
/// and boundary-length differences).
const CLIENT_SLACK: usize = 32;

/// Build the stock image-board plugin.
///
/// The plugin serves upload forms for every configured replacement page
/// containing the `[UPLOAD]` marker, backs each form with a multipart
/// image-upload body for the cover origin, and finalizes deferred bodies
/// against the client's content length.
pub fn image_board(images: Arc<ImageStore>) -> Plugin {
    let handle_images = Arc::clone(&images);
    let finalize_images = images;

    Plugin {
        handle_request: Box::new(move |cover, state| {
            let template = match cover.page(&state.req.resource) {
                Some(t) => t,
                None => return (String::new(), String::new()),
            };
            if !template.contains("[UPLOAD]") {
                return (template, String::new());
            }

            // build the cover POST first; its size dictates the form layout
            let boundary = create_key(BOUNDARY_LEN);
            let img = handle_images.pick().clone();
            let content = handle_images.content(&img);
            let body = multipart_body(&boundary, &img.name, &img.mime, &img.comment, &content, None);
            let total = body.len() + CLIENT_SLACK;
            cover.posts.put(boundary.clone(), body);

            let action = format!("/{}{}", boundary, cover.post_path());
            let page = template.replace("[UPLOAD]", &form::upload_form(&action, total));
            (page, boundary)
        }),

        sync_cover: Box::new(|_, state| {
            // mirror the hidden fields of the real page so the synthesized
            // form posts the same names the cover site expects
            let mut extras = String::new();
            while let Some(tag) = state.resp.xtra.get() {
                extras.push_str(&tag.to_string());
                extras.push('\n');
            }
            state.resp.pending.push_str(&extras);
        }),

        finalize_cover: Box::new(move |_cover, state| {
            let img = finalize_images.pick().clone();
            let content = finalize_images.content(&img);
            multipart_body(
                &state.req.boundary_out,
                &img.name,
                &img.mime,
                &img.comment,
                &content,
                Some(state.req.content_length),
            )
        }),
    }
}

/// Assemble a multipart/form-data body for an image upload.
///
/// With a `target` size the caption field is padded (or the body truncated,
/// with a warning) so the result is exactly `target` bytes long.
pub fn multipart_body(
    boundary: &str,
    file_name: &str,
    mime: &str,
    comment: &str,
    content: &[u8],
    target: Option<usize>,
) -> Vec<u8> {
    let sep = format!("-----------------------------{}", boundary);
    let mut head: Vec<u8> = Vec::new();

    let field = |out: &mut Vec<u8>, name: &str, value: &[u8]| {
        out.extend_from_slice(sep.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        out.extend_from_slice(value);
        out.extend_from_slice(b"\r\n");
    };

    field(&mut head, "imgUrl", b"");
    field(&mut head, "fileName[]", b"");

    head.extend_from_slice(sep.as_bytes());
    head.extend_from_slice(b"\r\n");
    head.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file[]\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            file_name, mime
        )
        .as_bytes(),
    );
    head.extend_from_slice(content);
    head.extend_from_slice(b"\r\n");

    let mut tail: Vec<u8> = Vec::new();
    field(&mut tail, "new_width[]", b"");
    field(&mut tail, "new_height[]", b"");
    field(&mut tail, "submit", b"Upload");
    tail.extend_from_slice(sep.as_bytes());
    tail.extend_from_slice(b"--\r\n\r\n");

    // caption field carries the padding when an exact size is requested
    let mut caption = comment.as_bytes().to_vec();
    if let Some(target) = target {
        // fixed framing of the caption field itself
        let caption_frame = sep.len() + 2
            + "Content-Disposition: form-data; name=\"alt[]\"\r\n\r\n".len()
            + 2;
        let fixed = head.len() + caption_frame + tail.len();
        if fixed + caption.len() < target {
            caption.resize(target - fixed, b'.');
        }
    }
    let mut body = head;
    field(&mut body, "alt[]", &caption);
    body.extend_from_slice(&tail);

    if let Some(target) = target {
        if body.len() > target {
            tracing::warn!(
                "cover POST body exceeds target by {} bytes, truncating",
                body.len() - target
            );
            body.truncate(target);
        }
    }
    body
}
