//! Client-side upload form generation.
//!
//! The form must make the browser produce a multipart POST of a known total
//! size, so that the upstream cover POST of the same size can replace it
//! byte for byte. The embedded script measures the base64 length of the
//! selected file and fills a hidden `rnd` field with exactly the missing
//! number of characters before submitting.

/// Byte overhead of the multipart framing the browser adds around the file
/// part and the `rnd` field. Measured against the form layout below; must
/// be re-measured if the form layout changes.
const FRAME_OVERHEAD: usize = 307;

/// Build an upload form page fragment for the given POST `action` that
/// submits a request of approximately `total` bytes.
pub fn upload_form(action: &str, total: usize) -> String {
    format!(
        concat!(
            "<h1>Upload your document:</h1>\n",
            "<script type=\"text/javascript\">\n",
            "function a(){{",
            "b=document.u.file.files.item(0).getAsDataURL();",
            "e=document.u.file.value.length;",
            "c=Math.ceil(3*(b.substring(b.indexOf(\",\")+1).length+3)/4);",
            "d=\"\";for(i=0;i<{total}-c-e-{overhead};i++){{d+=b.charAt(i%c)}}",
            "document.u.rnd.value=d;",
            "document.u.submit();",
            "}}\n",
            "document.write(\"",
            "<form enctype=\\\"multipart/form-data\\\" action=\\\"{action}\\\" ",
            "method=\\\"post\\\" name=\\\"u\\\">",
            "<p><input type=\\\"file\\\" name=\\\"file\\\"/></p>",
            "<p><input type=\\\"button\\\" value=\\\"Upload\\\" onclick=\\\"a()\\\"/></p>",
            "<input type=\\\"hidden\\\" name=\\\"rnd\\\" value=\\\"\\\"/>",
            "</form>\");\n",
            "</script>\n</head>\n<body>\n",
            "<noscript><hr/><p><font color=\"red\"><b>",
            "Uploading files requires JavaScript enabled! Please change the settings ",
            "of your browser and try again...</b></font></p><hr/>",
            "</noscript>\n",
            "<hr/>\n",
        ),
        total = total,
        overhead = FRAME_OVERHEAD,
        action = action,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_contains_action_and_fields() {
        let form = upload_form("/aB3x/upload.php", 5000);
        assert!(form.contains("action=\\\"/aB3x/upload.php\\\""));
        assert!(form.contains("name=\\\"file\\\""));
        assert!(form.contains("name=\\\"rnd\\\""));
        assert!(form.contains("<noscript>"));
    }

    #[test]
    fn test_form_encodes_total_size() {
        let form = upload_form("/x/y", 12345);
        assert!(form.contains("i<12345-c-e-307"));
    }
}
