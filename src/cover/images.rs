//! Cover image library.
//!
//! Cover POST bodies carry a genuine image so the upstream upload is a
//! plausible use of the cover site. Images are declared in a TOML file:
//!
//! ```toml
//! [[image]]
//! name = "sunset.jpg"
//! comment = "View from the pier"
//! path = "./images/sunset.jpg"
//! mime = "image/jpeg"
//! ```

use std::fs;
use std::path::Path;

use rand::Rng;
use rand_core::OsRng;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One image available as cover content.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDef {
    /// File name presented to the cover site
    pub name: String,
    /// Description text used as the image caption
    pub comment: String,
    /// Local path of the image file
    pub path: String,
    /// MIME type of the image
    pub mime: String,
    /// Size in bytes, filled in at load time
    #[serde(skip)]
    pub size: u64,
}

#[derive(Deserialize)]
struct ImageDefs {
    #[serde(default)]
    image: Vec<ImageDef>,
}

/// Loaded image library.
#[derive(Debug)]
pub struct ImageStore {
    images: Vec<ImageDef>,
}

impl ImageStore {
    /// Load image definitions from a TOML file.
    ///
    /// Definitions whose file is missing are skipped with a logged error;
    /// an unreadable definitions file or an empty result is fatal.
    pub fn load(defs: &Path) -> Result<Self> {
        let text = fs::read_to_string(defs)
            .map_err(|e| Error::config(format!("can't read image definitions {:?}: {}", defs, e)))?;
        let parsed: ImageDefs = toml::from_str(&text)
            .map_err(|e| Error::config(format!("bad image definitions {:?}: {}", defs, e)))?;

        let mut images = Vec::new();
        for mut img in parsed.image {
            match fs::metadata(&img.path) {
                Ok(meta) => {
                    img.size = meta.len();
                    tracing::debug!("image available: {}", img.name);
                    images.push(img);
                }
                Err(_) => {
                    tracing::error!("image '{}' missing", img.path);
                }
            }
        }
        if images.is_empty() {
            return Err(Error::config("no usable cover images"));
        }
        tracing::info!("{} cover images available", images.len());
        Ok(Self { images })
    }

    /// Build a store from already-resolved definitions. Used by tests and
    /// by plugins that synthesize content instead of reading files.
    pub fn from_defs(images: Vec<ImageDef>) -> Self {
        Self { images }
    }

    /// Pick a random image from the library.
    pub fn pick(&self) -> &ImageDef {
        &self.images[OsRng.gen_range(0..self.images.len())]
    }

    /// Read the binary content of an image.
    pub fn content(&self, img: &ImageDef) -> Vec<u8> {
        match fs::read(&img.path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("failed to read cover image '{}': {}", img.path, e);
                Vec::new()
            }
        }
    }

    /// Number of images available.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Is the library empty?
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_defs() -> Vec<ImageDef> {
        vec![
            ImageDef {
                name: "a.gif".into(),
                comment: "first".into(),
                path: "/nonexistent/a.gif".into(),
                mime: "image/gif".into(),
                size: 10,
            },
            ImageDef {
                name: "b.jpg".into(),
                comment: "second".into(),
                path: "/nonexistent/b.jpg".into(),
                mime: "image/jpeg".into(),
                size: 20,
            },
        ]
    }

    #[test]
    fn test_pick_returns_known_image() {
        let store = ImageStore::from_defs(test_defs());
        for _ in 0..10 {
            let img = store.pick();
            assert!(img.name == "a.gif" || img.name == "b.jpg");
        }
    }

    #[test]
    fn test_parse_defs() {
        let text = concat!(
            "[[image]]\n",
            "name = \"x.png\"\n",
            "comment = \"c\"\n",
            "path = \"./x.png\"\n",
            "mime = \"image/png\"\n",
        );
        let defs: ImageDefs = toml::from_str(text).unwrap();
        assert_eq!(defs.image.len(), 1);
        assert_eq!(defs.image[0].mime, "image/png");
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let err = ImageStore::load(Path::new("/nonexistent/defs.toml")).unwrap_err();
        assert!(err.is_startup_fatal());
    }
}
