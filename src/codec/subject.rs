use crate::CodecError;
use crate::WILDCARD;

/// Subject field of a wire message after parsing
///
/// `prefix*` and `*suffix` select every existing subject of the message's
/// type with that prefix / suffix; a bare `*` selects all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectPattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    All,
}

impl SubjectPattern {
    pub fn parse(subject: &str) -> Result<Self, CodecError> {
        if subject.is_empty() {
            return Err(CodecError::InvalidSubjectPattern(subject.to_string()));
        }
        if subject == "*" {
            return Ok(SubjectPattern::All);
        }

        let stars = subject.matches(WILDCARD).count();
        match stars {
            0 => Ok(SubjectPattern::Exact(subject.to_string())),
            1 if subject.ends_with(WILDCARD) => Ok(SubjectPattern::Prefix(
                subject.trim_end_matches(WILDCARD).to_string(),
            )),
            1 if subject.starts_with(WILDCARD) => Ok(SubjectPattern::Suffix(
                subject.trim_start_matches(WILDCARD).to_string(),
            )),
            _ => Err(CodecError::InvalidSubjectPattern(subject.to_string())),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, SubjectPattern::Exact(_))
    }

    pub fn matches(
        &self,
        subject: &str,
    ) -> bool {
        match self {
            SubjectPattern::Exact(name) => name == subject,
            SubjectPattern::Prefix(prefix) => subject.starts_with(prefix.as_str()),
            SubjectPattern::Suffix(suffix) => subject.ends_with(suffix.as_str()),
            SubjectPattern::All => true,
        }
    }
}
