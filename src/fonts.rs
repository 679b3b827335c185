// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use usvg::fontdb;

/// Vertical metrics for one (font, size) pair, in user units.
#[derive(Clone, Copy, Debug)]
pub struct FontMetrics {
    /// Distance from the baseline to the top of the em box.
    pub ascent: f64,
    /// Distance from the baseline to the bottom of the em box, positive.
    pub descent: f64,
    /// Recommended baseline-to-baseline distance.
    pub line_height: f64,
}

/// The process-wide font store.
///
/// Font discovery and file loading happen once per key; a missing key is
/// computed and inserted under the lock, so concurrent compiles share the
/// work. Entries are pure functions of the key.
struct FontStore {
    db: fontdb::Database,
    family_ids: HashMap<String, Option<fontdb::ID>>,
    file_data: HashMap<String, Option<Arc<Vec<u8>>>>,
    metrics: HashMap<(String, u32), FontMetrics>,
}

static STORE: Lazy<Mutex<FontStore>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    Mutex::new(FontStore {
        db,
        family_ids: HashMap::new(),
        file_data: HashMap::new(),
        metrics: HashMap::new(),
    })
});

enum FaceSource {
    Db(fontdb::ID),
    File(Arc<Vec<u8>>),
}

fn lock_store() -> std::sync::MutexGuard<'static, FontStore> {
    match STORE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn cache_key(family: Option<&str>, path: Option<&str>) -> String {
    path.or(family).unwrap_or("sans-serif").to_lowercase()
}

fn size_key(size: f64) -> u32 {
    (size.round() as i64).max(1) as u32
}

fn generic_family(name: &str) -> Option<fontdb::Family<'static>> {
    match name.to_lowercase().as_str() {
        "sans-serif" => Some(fontdb::Family::SansSerif),
        "serif" => Some(fontdb::Family::Serif),
        "monospace" => Some(fontdb::Family::Monospace),
        "cursive" => Some(fontdb::Family::Cursive),
        "fantasy" => Some(fontdb::Family::Fantasy),
        _ => None,
    }
}

impl FontStore {
    fn resolve_family(&mut self, family: &str) -> Option<fontdb::ID> {
        let key = family.to_lowercase();
        if let Some(cached) = self.family_ids.get(&key) {
            return *cached;
        }

        let primary = generic_family(family).unwrap_or(fontdb::Family::Name(family));
        let families = [primary, fontdb::Family::SansSerif];
        let id = self.db.query(&fontdb::Query {
            families: &families,
            ..fontdb::Query::default()
        });

        self.family_ids.insert(key, id);
        id
    }

    fn resolve_file(&mut self, path: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(cached) = self.file_data.get(path) {
            return cached.clone();
        }

        let data = match std::fs::read(path) {
            Ok(data) => Some(Arc::new(data)),
            Err(e) => {
                log::warn!("failed to read font file '{}': {}", path, e);
                None
            }
        };

        self.file_data.insert(path.to_string(), data.clone());
        data
    }

    fn resolve(&mut self, family: Option<&str>, path: Option<&str>) -> Option<FaceSource> {
        if let Some(path) = path {
            if let Some(data) = self.resolve_file(path) {
                return Some(FaceSource::File(data));
            }
        }
        let family = family.unwrap_or("sans-serif");
        self.resolve_family(family).map(FaceSource::Db)
    }

    fn with_face<T>(
        &self,
        source: &FaceSource,
        f: impl FnOnce(&ttf_parser::Face) -> T,
    ) -> Option<T> {
        match source {
            FaceSource::Db(id) => self
                .db
                .with_face_data(*id, |data, index| {
                    ttf_parser::Face::parse(data, index).ok().map(|face| f(&face))
                })
                .flatten(),
            FaceSource::File(data) => {
                ttf_parser::Face::parse(data, 0).ok().map(|face| f(&face))
            }
        }
    }
}

/// Returns ascent/descent/line height for the given size, family and
/// optional explicit font file. Falls back to a size-proportional estimate
/// when no usable face exists.
pub fn metrics(size: f64, family: Option<&str>, path: Option<&str>) -> FontMetrics {
    let key = (cache_key(family, path), size_key(size));

    let mut store = lock_store();
    if let Some(cached) = store.metrics.get(&key) {
        return *cached;
    }

    let computed = store
        .resolve(family, path)
        .and_then(|source| store.with_face(&source, |face| face_metrics(face, size)))
        .unwrap_or_else(|| fallback_metrics(size));

    store.metrics.insert(key, computed);
    computed
}

/// Measures the width of `text` at the given size. Glyphs missing from the
/// resolved face, and texts with no face at all, use the character-class
/// heuristic.
pub fn measure_text(text: &str, size: f64, family: Option<&str>, path: Option<&str>) -> f64 {
    let mut store = lock_store();
    let measured = store.resolve(family, path).and_then(|source| {
        store.with_face(&source, |face| {
            let upem = face.units_per_em() as f64;
            if upem <= 0.0 {
                return heuristic_width(text, size);
            }
            let scale = size / upem;
            text.chars()
                .map(|c| {
                    face.glyph_index(c)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .map(|adv| adv as f64 * scale)
                        .unwrap_or_else(|| heuristic_char_width(c, size))
                })
                .sum()
        })
    });

    measured.unwrap_or_else(|| heuristic_width(text, size))
}

fn face_metrics(face: &ttf_parser::Face, size: f64) -> FontMetrics {
    let upem = face.units_per_em() as f64;
    if upem <= 0.0 {
        return fallback_metrics(size);
    }
    let scale = size / upem;
    let ascent = face.ascender() as f64 * scale;
    let descent = -(face.descender() as f64) * scale;
    let mut line_height =
        (face.ascender() as f64 - face.descender() as f64 + face.line_gap() as f64) * scale;
    if line_height <= 0.0 {
        line_height = ascent + descent;
    }
    FontMetrics {
        ascent,
        descent,
        line_height,
    }
}

fn fallback_metrics(size: f64) -> FontMetrics {
    FontMetrics {
        ascent: 0.8 * size,
        descent: 0.2 * size,
        line_height: size,
    }
}

fn heuristic_char_width(c: char, size: f64) -> f64 {
    if c.is_whitespace() {
        size * 0.33
    } else if matches!(c, 'i' | 'l') {
        size * 0.3
    } else if matches!(c, 'm' | 'w' | 'M' | 'W' | '@' | '#') {
        size * 0.9
    } else {
        size * 0.6
    }
}

/// Character-class width estimate used when no glyph backend is available.
pub fn heuristic_width(text: &str, size: f64) -> f64 {
    text.chars().map(|c| heuristic_char_width(c, size)).sum()
}

/// Expands a leading `~/` against the home directory.
pub fn expand_user(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_width_classes() {
        assert!((heuristic_width("il", 10.0) - 6.0).abs() < 1e-9);
        assert!((heuristic_width("mW", 10.0) - 18.0).abs() < 1e-9);
        assert!((heuristic_width(" ", 10.0) - 3.3).abs() < 1e-9);
        assert!((heuristic_width("ab", 10.0) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn fallback_metrics_are_proportional() {
        let m = fallback_metrics(20.0);
        assert!((m.ascent - 16.0).abs() < 1e-9);
        assert!((m.descent - 4.0).abs() < 1e-9);
        assert!((m.line_height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_never_panic_for_unknown_fonts() {
        let m = metrics(16.0, Some("definitely-not-a-font-xyz"), None);
        assert!(m.ascent > 0.0);
        assert!(m.descent >= 0.0);
    }
}
