use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── QUIZ TYPE ─────────────────────────────────────────────────────────────────
//

/// How the questions of a quiz were selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    /// Mixed questions from every area.
    General,
    /// Questions from a single subject area.
    Area,
    /// Questions from a single discipline within an area.
    Discipline,
    /// Free practice; not counted toward mastery.
    Practice,
    /// Re-practice of previously missed questions.
    Review,
}

impl QuizType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::General => "general",
            QuizType::Area => "area",
            QuizType::Discipline => "discipline",
            QuizType::Practice => "practice",
            QuizType::Review => "review",
        }
    }

    #[must_use]
    pub fn counts_toward_mastery(&self) -> bool {
        !matches!(self, QuizType::Practice)
    }
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quiz type: {0}")]
pub struct ParseQuizTypeError(pub String);

impl FromStr for QuizType {
    type Err = ParseQuizTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "general" => Ok(QuizType::General),
            "area" => Ok(QuizType::Area),
            "discipline" => Ok(QuizType::Discipline),
            "practice" => Ok(QuizType::Practice),
            "review" => Ok(QuizType::Review),
            other => Err(ParseQuizTypeError(other.to_string())),
        }
    }
}

//
// ─── SLOT KEY ──────────────────────────────────────────────────────────────────
//

const NULL_FRAGMENT: &str = "_";

/// The (quiz type, area, discipline) triple that owns one "best" attempt.
///
/// Missing area or discipline is kept as `None` rather than folded into a
/// placeholder string, so a quiz without an area never collides with an area
/// literally named "general". Blank names are normalized to `None`, also when
/// a key is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawSlotKey")]
pub struct SlotKey {
    quiz_type: QuizType,
    area: Option<String>,
    disciplina: Option<String>,
}

#[derive(Deserialize)]
struct RawSlotKey {
    quiz_type: QuizType,
    area: Option<String>,
    disciplina: Option<String>,
}

impl From<RawSlotKey> for SlotKey {
    fn from(raw: RawSlotKey) -> Self {
        Self::new(raw.quiz_type, raw.area.as_deref(), raw.disciplina.as_deref())
    }
}

impl SlotKey {
    #[must_use]
    pub fn new(quiz_type: QuizType, area: Option<&str>, disciplina: Option<&str>) -> Self {
        Self {
            quiz_type,
            area: normalize(area),
            disciplina: normalize(disciplina),
        }
    }

    /// Key for a quiz type that has no area or discipline.
    #[must_use]
    pub fn general(quiz_type: QuizType) -> Self {
        Self::new(quiz_type, None, None)
    }

    #[must_use]
    pub fn quiz_type(&self) -> QuizType {
        self.quiz_type
    }

    #[must_use]
    pub fn area(&self) -> Option<&str> {
        self.area.as_deref()
    }

    #[must_use]
    pub fn disciplina(&self) -> Option<&str> {
        self.disciplina.as_deref()
    }

    pub(crate) fn into_parts(self) -> (QuizType, Option<String>, Option<String>) {
        (self.quiz_type, self.area, self.disciplina)
    }

    /// Renders `type:area` for cache keys.
    ///
    /// A present name is prefixed with `=` and a missing one renders empty, so
    /// no area name can stand in for the missing area.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        format!("{}:{}", self.quiz_type.as_str(), fragment(self.area()))
    }

    /// Like [`SlotKey::cache_fragment`], with the discipline appended.
    #[must_use]
    pub fn full_cache_fragment(&self) -> String {
        format!("{}:{}", self.cache_fragment(), fragment(self.disciplina()))
    }
}

fn fragment(value: Option<&str>) -> String {
    value.map(|v| format!("={v}")).unwrap_or_default()
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.quiz_type,
            self.area().unwrap_or(NULL_FRAGMENT),
            self.disciplina().unwrap_or(NULL_FRAGMENT)
        )
    }
}

pub(crate) fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_type_parses_its_own_string_form() {
        for ty in [
            QuizType::General,
            QuizType::Area,
            QuizType::Discipline,
            QuizType::Practice,
            QuizType::Review,
        ] {
            assert_eq!(ty.as_str().parse::<QuizType>().unwrap(), ty);
        }
        assert!("simulado".parse::<QuizType>().is_err());
    }

    #[test]
    fn only_practice_is_excluded_from_mastery() {
        assert!(!QuizType::Practice.counts_toward_mastery());
        assert!(QuizType::Review.counts_toward_mastery());
    }

    #[test]
    fn blank_area_normalizes_to_none() {
        let key = SlotKey::new(QuizType::General, Some("  "), Some(""));
        assert_eq!(key, SlotKey::general(QuizType::General));
    }

    #[test]
    fn missing_area_does_not_collide_with_general_literal() {
        let none = SlotKey::general(QuizType::General);
        let literal = SlotKey::new(QuizType::General, Some("general"), None);
        assert_ne!(none, literal);
    }

    #[test]
    fn cache_fragment_keeps_missing_area_apart_from_any_name() {
        let key = SlotKey::general(QuizType::Review);
        assert_eq!(key.cache_fragment(), "review:");
        let key = SlotKey::new(QuizType::Area, Some("Lógica"), None);
        assert_eq!(key.cache_fragment(), "area:=Lógica");

        let underscore = SlotKey::new(QuizType::Area, Some("_"), None);
        assert_ne!(
            underscore.cache_fragment(),
            SlotKey::general(QuizType::Area).cache_fragment()
        );
        assert_eq!(
            SlotKey::new(QuizType::Discipline, Some("Lógica"), Some("Sets")).full_cache_fragment(),
            "discipline:=Lógica:=Sets"
        );
    }

    #[test]
    fn deserialized_blank_names_normalize_to_none() {
        let key: SlotKey =
            serde_json::from_str(r#"{"quiz_type":"area","area":"  ","disciplina":" x "}"#)
                .unwrap();
        assert_eq!(key.area(), None);
        assert_eq!(key.disciplina(), Some("x"));
        assert_eq!(key, SlotKey::new(QuizType::Area, None, Some("x")));
    }
}
