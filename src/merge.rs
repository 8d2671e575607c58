//! Field-level merging of provider results into one movie record.
//!
//! Each attribute takes the first non-empty value in a fixed source order:
//!
//! | Attributes | Order |
//! |------------|-------|
//! | cover, backdrop, banner | Tertiary, Secondary, Primary |
//! | title, rating, plot, tagline, year, genre | Secondary, Primary, Tertiary |
//! | director, actors, language, type, trailer | Primary, Secondary, Local, Tertiary |
//!
//! `Local` is the record already stored for the id, so a refresh only lets
//! aggregator text fill fields nothing better has set. Values are normalized
//! before they are stored. Identifying fields that every source leaves empty
//! keep their stored value through the non-destructive upsert in
//! [`movie_store`](crate::movie_store).

use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Regex;

use crate::models::{MovieRecord, ProviderResult};
use crate::providers::SourceKind;

pub const ARTWORK_ORDER: [SourceKind; 3] =
    [SourceKind::Tertiary, SourceKind::Secondary, SourceKind::Primary];
pub const IDENTIFYING_ORDER: [SourceKind; 3] =
    [SourceKind::Secondary, SourceKind::Primary, SourceKind::Tertiary];
pub const DESCRIPTIVE_ORDER: [SourceKind; 4] = [
    SourceKind::Primary,
    SourceKind::Secondary,
    SourceKind::Local,
    SourceKind::Tertiary,
];

/// Maximum stored length of the genre and language columns.
const LIST_COLUMN_MAX: usize = 64;

/// Longest character reference worth trying, `&` and `;` included.
const ENTITY_MAX: usize = 40;

static FULL_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+See full summary »").expect("summary regex"));
static TYPE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._]").expect("type regex"));

/// A merged record plus the artwork still to be downloaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedMovie {
    pub record: MovieRecord,
    pub cover_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub banner_url: Option<String>,
}

/// First non-empty value of `field` in `order`.
pub fn first_non_empty<T, F>(
    results: &[(SourceKind, ProviderResult)],
    order: &[SourceKind],
    field: F,
) -> Option<T>
where
    F: Fn(&ProviderResult) -> Option<T>,
{
    order.iter().find_map(|kind| {
        results
            .iter()
            .filter(|(k, _)| k == kind)
            .find_map(|(_, r)| field(r))
    })
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty_list(v: &[String]) -> Option<Vec<String>> {
    let list: Vec<String> = v
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

/// The descriptive columns of a stored record, as a `Local` source.
pub fn local_result(record: &MovieRecord) -> ProviderResult {
    let list = |s: &str| -> Vec<String> {
        if s.trim().is_empty() {
            Vec::new()
        } else {
            vec![s.to_string()]
        }
    };
    let text = |s: &str| Some(s.to_string()).filter(|s| !s.trim().is_empty());
    ProviderResult {
        directors: list(&record.director),
        cast: list(&record.actors),
        languages: list(&record.language),
        media_type: text(&record.media_type),
        trailer: text(&record.trailer),
        ..ProviderResult::default()
    }
}

/// Merge `results` for catalog id `imdb_id`. Timestamps are left at zero.
pub fn merge(imdb_id: &str, results: &[(SourceKind, ProviderResult)]) -> MergedMovie {
    let ident = |f: fn(&ProviderResult) -> Option<String>| {
        first_non_empty(results, &IDENTIFYING_ORDER, f)
    };
    let descr = |f: fn(&ProviderResult) -> Option<String>| {
        first_non_empty(results, &DESCRIPTIVE_ORDER, f)
    };
    let art = |f: fn(&ProviderResult) -> Option<String>| {
        first_non_empty(results, &ARTWORK_ORDER, f)
    };

    let title = ident(|r| non_empty(&r.title)).unwrap_or_default();
    let rating = first_non_empty(results, &IDENTIFYING_ORDER, |r| {
        r.rating.filter(|v| *v > 0.0)
    });
    let genres = first_non_empty(results, &IDENTIFYING_ORDER, |r| non_empty_list(&r.genres));
    let directors = first_non_empty(results, &DESCRIPTIVE_ORDER, |r| non_empty_list(&r.directors));
    let cast = first_non_empty(results, &DESCRIPTIVE_ORDER, |r| non_empty_list(&r.cast));
    let languages = first_non_empty(results, &DESCRIPTIVE_ORDER, |r| non_empty_list(&r.languages));

    let record = MovieRecord {
        imdb_id: imdb_id.to_string(),
        tmdb_id: first_non_empty(
            results,
            &[SourceKind::Secondary, SourceKind::Tertiary, SourceKind::Primary],
            |r| r.tmdb_id.filter(|id| *id > 0),
        ),
        title: clean_title(&title),
        tagline: ident(|r| non_empty(&r.tagline))
            .map(|t| decode_entities(&t))
            .unwrap_or_default(),
        rating: rating.map(format_rating).unwrap_or_default(),
        plot: ident(|r| non_empty(&r.plot))
            .map(|p| clean_plot(&p))
            .unwrap_or_default(),
        year: ident(|r| non_empty(&r.year)).unwrap_or_default(),
        genre: genres
            .map(|g| truncate(&decode_entities(&join_unique(&g)), LIST_COLUMN_MAX))
            .unwrap_or_default(),
        media_type: descr(|r| non_empty(&r.media_type))
            .map(|t| clean_type(&t))
            .unwrap_or_default(),
        director: directors
            .map(|d| decode_entities(&join_unique(&d)))
            .unwrap_or_default(),
        actors: cast
            .map(|c| decode_entities(&join_unique(&c)))
            .unwrap_or_default(),
        language: languages
            .map(|l| truncate(&decode_entities(&join_unique(&l)), LIST_COLUMN_MAX))
            .unwrap_or_default(),
        trailer: descr(|r| non_empty(&r.trailer)).unwrap_or_default(),
        ..MovieRecord::default()
    };

    MergedMovie {
        record,
        cover_url: art(|r| non_empty(&r.cover_url)),
        backdrop_url: art(|r| non_empty(&r.backdrop_url)),
        banner_url: art(|r| non_empty(&r.banner_url)),
    }
}

/// Decode entities and strip path separators.
pub fn clean_title(title: &str) -> String {
    decode_entities(title)
        .replace(['/', '\\'], "")
        .trim()
        .to_string()
}

pub fn clean_plot(plot: &str) -> String {
    decode_entities(&FULL_SUMMARY.replace_all(plot, " "))
        .trim()
        .to_string()
}

/// `video.movie` → `Video Movie`.
pub fn clean_type(media_type: &str) -> String {
    let spaced = TYPE_SEPARATORS.replace_all(media_type, " ");
    decode_entities(&title_case(&spaced))
}

/// Rounded to one decimal, without a trailing `.0`.
pub fn format_rating(rating: f64) -> String {
    let rounded = (rating * 10.0).round() / 10.0;
    format!("{}", rounded)
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_unique(items: &[String]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for item in items {
        if !seen.contains(&item.as_str()) {
            seen.push(item.as_str());
        }
    }
    seen.join(", ")
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Decode named (HTML5) and numeric character references. Unknown or
/// unterminated references are kept as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let reference = tail
            .find(';')
            .filter(|&end| end < ENTITY_MAX)
            .map(|end| &tail[..=end]);
        let decoded = reference.and_then(|r| {
            unescape_with(r, resolve_html5_entity)
                .ok()
                .map(|d| (d, r.len()))
        });
        match decoded {
            Some((decoded, len)) => {
                out.push_str(&decoded);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> ProviderResult {
        ProviderResult {
            title: Some(title.to_string()),
            ..ProviderResult::default()
        }
    }

    #[test]
    fn identifying_fields_prefer_secondary() {
        let mut primary = result("Primary Title");
        primary.plot = Some("primary plot".into());
        primary.directors = vec!["Primary Director".into()];
        let mut secondary = result("Secondary Title");
        secondary.directors = vec!["Secondary Director".into()];
        let tertiary = result("Tertiary Title");

        let merged = merge(
            "0000001",
            &[
                (SourceKind::Tertiary, tertiary),
                (SourceKind::Primary, primary),
                (SourceKind::Secondary, secondary),
            ],
        );
        assert_eq!(merged.record.title, "Secondary Title");
        // secondary has no plot, so it falls through to primary
        assert_eq!(merged.record.plot, "primary plot");
        assert_eq!(merged.record.director, "Primary Director");
    }

    #[test]
    fn artwork_prefers_tertiary() {
        let mut primary = result("a");
        primary.cover_url = Some("http://primary/cover.jpg".into());
        let mut secondary = result("a");
        secondary.cover_url = Some("http://secondary/cover.jpg".into());
        secondary.backdrop_url = Some("http://secondary/backdrop.jpg".into());
        let mut tertiary = ProviderResult::default();
        tertiary.cover_url = Some("http://tertiary/cover.jpg".into());

        let merged = merge(
            "1",
            &[
                (SourceKind::Primary, primary),
                (SourceKind::Secondary, secondary),
                (SourceKind::Tertiary, tertiary),
            ],
        );
        assert_eq!(merged.cover_url.as_deref(), Some("http://tertiary/cover.jpg"));
        assert_eq!(
            merged.backdrop_url.as_deref(),
            Some("http://secondary/backdrop.jpg")
        );
        assert_eq!(merged.banner_url, None);
    }

    #[test]
    fn empty_values_never_win() {
        let mut secondary = result("  ");
        secondary.genres = vec![String::new()];
        let mut primary = result("Real Title");
        primary.genres = vec!["Drama".into(), "Drama".into(), "Crime".into()];
        let merged = merge(
            "1",
            &[(SourceKind::Secondary, secondary), (SourceKind::Primary, primary)],
        );
        assert_eq!(merged.record.title, "Real Title");
        assert_eq!(merged.record.genre, "Drama, Crime");
    }

    #[test]
    fn normalization() {
        assert_eq!(clean_title("AC/DC: Let There Be Rock"), "ACDC: Let There Be Rock");
        assert_eq!(clean_title("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(
            clean_plot("A long story. See full summary »"),
            "A long story."
        );
        assert_eq!(clean_type("video.movie"), "Video Movie");
        assert_eq!(format_rating(7.25), "7.3");
        assert_eq!(format_rating(8.0), "8");
        assert_eq!(decode_entities("it&#39;s &#x41; &bogus; &"), "it's A &bogus; &");
    }

    #[test]
    fn decodes_the_full_html_entity_set() {
        assert_eq!(decode_entities("Gar&ccedil;on"), "Garçon");
        assert_eq!(decode_entities("El Ni&ntilde;o"), "El Niño");
        assert_eq!(decode_entities("Ocean&rsquo;s Eleven"), "Ocean\u{2019}s Eleven");
        assert_eq!(decode_entities("Die Stra&szlig;e"), "Die Straße");
        assert_eq!(clean_title("Am&eacute;lie &amp; co"), "Amélie & co");
        assert_eq!(decode_entities("R&D; &amp &x;"), "R&D; &amp &x;");
    }

    #[test]
    fn stored_descriptions_outrank_aggregator_text() {
        let stored = MovieRecord {
            imdb_id: "1".into(),
            director: "Henry Selick".into(),
            language: "English".into(),
            ..MovieRecord::default()
        };
        let mut tertiary = result("Coraline");
        tertiary.directors = vec!["Someone Else".into()];
        tertiary.languages = vec!["en".into()];
        tertiary.trailer = Some("https://youtube.com/embed/abc".into());
        let mut primary = result("Coraline");
        primary.languages = vec!["English, Japanese".into()];

        let merged = merge(
            "1",
            &[
                (SourceKind::Local, local_result(&stored)),
                (SourceKind::Primary, primary),
                (SourceKind::Tertiary, tertiary),
            ],
        );
        assert_eq!(merged.record.director, "Henry Selick");
        assert_eq!(merged.record.language, "English, Japanese");
        // nothing stored, so aggregator text fills it
        assert_eq!(merged.record.trailer, "https://youtube.com/embed/abc");
    }

    #[test]
    fn long_genre_lists_are_truncated() {
        let mut secondary = result("x");
        secondary.genres = (0..20).map(|i| format!("Genre{}", i)).collect();
        let merged = merge("1", &[(SourceKind::Secondary, secondary)]);
        assert_eq!(merged.record.genre.chars().count(), 64);
    }
}
