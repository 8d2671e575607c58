//! Title and year extraction from scene-style release names.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::CandidateTitle;

/// Release tags that follow the title in scene names.
const FOLLOWING_LIST: &str = r"[^\w]((1080|480|720)p|AC3D|Directors([^\w]CUT)?|DD5\.1|(DVD|BD|BR)(Rip)?|BluRay|divx|HDTV|iNTERNAL|LiMiTED|(Real\.)?Proper|RE(pack|Rip)|Sub\.?(fix|pack)|Unrated|WEB-DL|(x|H)[-._ ]?264|xvid)[^\w]";

static NAME_WITH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?P<name>[\w. -]+)[^\w](?P<year>(19|20)\d\d)").expect("name/year regex")
});

static NAME_BEFORE_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)([^\w]{{2,}})?(?P<name>[\w .-]+?){}", FOLLOWING_LIST))
        .expect("name/tags regex")
});

static TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?i){}", FOLLOWING_LIST)).expect("tags regex"));

static PARENS_AND_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(.*?\)|[._]").expect("separator regex"));

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("space regex"));

/// Parse a release name into a lookup candidate.
///
/// Returns `None` when no plausible title is found, or the cleaned title is
/// four characters or shorter, or consists only of digits.
pub fn parse(raw: &str) -> Option<CandidateTitle> {
    let (name, year) = if let Some(caps) = NAME_WITH_YEAR.captures(raw) {
        (
            caps.name("name")?.as_str(),
            caps.name("year").map(|y| y.as_str().to_string()),
        )
    } else if let Some(caps) = NAME_BEFORE_TAGS.captures(raw) {
        (caps.name("name")?.as_str(), None)
    } else {
        return None;
    };

    let title = clean(name);
    if title.len() <= 4 || title.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(CandidateTitle { title, year })
}

fn clean(name: &str) -> String {
    let name = TAGS.replace_all(name, " ");
    let name = PARENS_AND_SEPARATORS.replace_all(&name, " ");
    MULTI_SPACE.replace_all(&name, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_year() {
        let c = parse("Coraline.2009.DUTCH.INTERNAL.1080p.BluRay.x264-VeDeTT").unwrap();
        assert_eq!(c.title, "Coraline");
        assert_eq!(c.year.as_deref(), Some("2009"));
    }

    #[test]
    fn title_before_tags_without_year() {
        let c = parse("Some.Movie.LIMITED.DVDRip.XviD").unwrap();
        assert_eq!(c.title, "Some Movie");
        assert_eq!(c.year, None);
    }

    #[test]
    fn bracketed_usenet_subject() {
        let raw = "[61420]-[FULL]-[a.b.foreignEFNet]-[ Coraline.2009.DUTCH.INTERNAL.1080p.BluRay.x264-VeDeTT ]-[21/85]";
        let c = parse(raw).unwrap();
        assert_eq!(c.year.as_deref(), Some("2009"));
        assert!(c.title.ends_with("Coraline"), "got {}", c.title);
    }

    #[test]
    fn underscores_become_spaces() {
        let c = parse("The_Big_Movie 1999 iNTERNAL").unwrap();
        assert_eq!(c.title, "The Big Movie");
        assert_eq!(c.year.as_deref(), Some("1999"));
    }

    #[test]
    fn rejects_digits_and_short_names() {
        assert_eq!(parse("1234"), None);
        assert_eq!(parse("12345.2001"), None);
        assert_eq!(parse("Up.2009"), None);
        assert_eq!(parse(""), None);
    }
}
