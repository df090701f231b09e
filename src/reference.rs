//! # Image Reference Module
//!
//! Questo modulo modella un riferimento immagine e la risoluzione dei path.
//!
//! ## Responsabilità:
//! - Distingue sorgenti locali (path relativi) da sorgenti remote (URL assoluti)
//! - Scompone un riferimento in directory, stem ed estensione
//! - Deriva il nome file di cache per sorgenti remote (sanitizzazione URL)
//! - Risolve il path locale della sorgente rispetto alla configurazione
//!
//! ## Risoluzione della sorgente locale:
//! - remota → `<build_dir>/<nome sanitizzato>`
//! - già esportata (`/<static_dist_dir>/...`) → path corrispondente sotto `build_dir`
//! - altrimenti → `<public_dir>/<source>`

use std::path::PathBuf;

use crate::config::Config;

/// Characters replaced with `_` when deriving a cache filename from a URL
const UNSAFE_FILENAME_CHARS: &[char] =
    &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#', '%'];

/// The split parts of a file path or URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPath {
    /// Everything before the filename, trailing separator included
    pub dir: String,
    /// Filename without its extension
    pub stem: String,
    /// Lowercased extension, empty when the filename has none
    pub extension: String,
}

/// Split a path or URL into directory, stem and lowercased extension
pub fn split_file_path(file_path: &str) -> SplitPath {
    let file_name = file_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_path)
        .to_string();
    let dir = file_path[..file_path.len() - file_name.len()].to_string();

    let (stem, extension) = match file_name.rfind('.') {
        Some(0) | None => (file_name.clone(), String::new()),
        Some(dot) => (
            file_name[..dot].to_string(),
            file_name[dot + 1..].to_lowercase(),
        ),
    };

    SplitPath {
        dir,
        stem,
        extension,
    }
}

/// An image identified by a local relative path or a remote absolute URL
#[derive(Debug, Clone)]
pub struct ImageReference {
    source: String,
    remote: bool,
    parts: SplitPath,
}

impl ImageReference {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            remote: has_url_scheme(source),
            parts: split_file_path(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn extension(&self) -> &str {
        &self.parts.extension
    }

    pub fn is_svg(&self) -> bool {
        self.parts.extension == "svg"
    }

    /// Filename a remote source is cached under: scheme stripped, unsafe and
    /// control characters removed, whitespace trimmed
    pub fn cache_file_name(&self) -> String {
        let without_scheme = ["https://", "http://", "ftp://"]
            .iter()
            .find_map(|scheme| self.source.strip_prefix(scheme))
            .unwrap_or(&self.source);

        without_scheme
            .chars()
            .map(|c| {
                if UNSAFE_FILENAME_CHARS.contains(&c) {
                    '_'
                } else {
                    c
                }
            })
            .filter(|c| !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Where the source file lives (or is downloaded to) on disk
    pub fn local_source_path(&self, config: &Config) -> PathBuf {
        if self.remote {
            return config.build_dir.join(self.cache_file_name());
        }

        let exported_prefix = format!("/{}", config.static_dist_dir);
        if let Some(remainder) = self.source.strip_prefix(&exported_prefix) {
            return PathBuf::from(format!("{}{}", config.build_dir.display(), remainder));
        }

        config.public_dir.join(self.source.trim_start_matches('/'))
    }
}

fn has_url_scheme(source: &str) -> bool {
    match source.find("://") {
        Some(0) | None => false,
        Some(pos) => source[..pos].chars().all(|c| c.is_ascii_alphabetic()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_file_path() {
        let parts = split_file_path("media/photos/House.JPG");
        assert_eq!(parts.dir, "media/photos/");
        assert_eq!(parts.stem, "House");
        assert_eq!(parts.extension, "jpg");

        let bare = split_file_path("icon.svg");
        assert_eq!(bare.dir, "");
        assert_eq!(bare.stem, "icon");
        assert_eq!(bare.extension, "svg");

        let no_ext = split_file_path("media/README");
        assert_eq!(no_ext.stem, "README");
        assert_eq!(no_ext.extension, "");
    }

    #[test]
    fn test_remote_detection() {
        assert!(ImageReference::parse("https://example.com/a.png").is_remote());
        assert!(ImageReference::parse("ftp://example.com/a.png").is_remote());
        assert!(!ImageReference::parse("media/a.png").is_remote());
        assert!(!ImageReference::parse("/static/media/a.png").is_remote());
        assert!(!ImageReference::parse("://no-scheme.png").is_remote());
    }

    #[test]
    fn test_cache_file_name() {
        let reference = ImageReference::parse("https://example.com/a.png");
        assert_eq!(reference.cache_file_name(), "example.com_a.png");

        let messy = ImageReference::parse("https://cdn.example.com/img/a b.png?v=2#top");
        assert_eq!(messy.cache_file_name(), "cdn.example.com_img_a b.png_v=2_top");
    }

    #[test]
    fn test_local_source_path() {
        let config = Config::default();

        let remote = ImageReference::parse("https://example.com/a.png");
        assert_eq!(
            remote.local_source_path(&config),
            PathBuf::from("build/static/media/example.com_a.png")
        );

        let exported = ImageReference::parse("/static/media/gallery/pic.png");
        assert_eq!(
            exported.local_source_path(&config),
            PathBuf::from("build/static/media/gallery/pic.png")
        );

        let public = ImageReference::parse("media/house.jpg");
        assert_eq!(
            public.local_source_path(&config),
            PathBuf::from("public/media/house.jpg")
        );
    }
}
