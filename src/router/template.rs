//! Path templates: parsing, shape identity and single-template matching.
//!
//! A template such as `/a/{a}/bar/{b}` is split on `/` into literal and
//! placeholder segments. Placeholder values are captured in the order the
//! placeholders are declared, never by name.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::core::ParamVec;
use crate::error::TemplateError;

/// Segments of a concrete request path, stack-allocated for typical depths
pub(crate) type PathSegments<'a> = SmallVec<[&'a str; 16]>;

/// One `/`-separated piece of a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches a byte-equal concrete segment
    Literal(Arc<str>),
    /// Matches any non-empty concrete segment and captures it
    Param(Arc<str>),
}

impl Segment {
    /// True for placeholder segments
    #[must_use]
    pub fn is_param(&self) -> bool {
        matches!(self, Segment::Param(_))
    }
}

/// A parsed route template
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: Arc<str>,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse an absolute template string
    ///
    /// `/` is the root template and has no segments.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(TemplateError::NotAbsolute {
                template: template.to_string(),
            });
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for (position, part) in rest.split('/').enumerate() {
                segments.push(Self::parse_segment(template, position, part)?);
            }
        }

        Self::check_unique_params(template, &segments)?;

        Ok(Self {
            raw: Arc::from(template),
            segments,
        })
    }

    /// Parse `template` mounted under `prefix`
    ///
    /// A prefix of `""` or `/` mounts at the root. A trailing `/` on the prefix
    /// is ignored so `/api/v1/` and `/api/v1` mount identically. The template
    /// itself must be absolute.
    pub fn with_prefix(prefix: &str, template: &str) -> Result<Self, TemplateError> {
        if !template.starts_with('/') {
            return Err(TemplateError::NotAbsolute {
                template: template.to_string(),
            });
        }
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return Self::parse(template);
        }
        if template == "/" {
            return Self::parse(prefix);
        }
        let mut joined = String::with_capacity(prefix.len() + template.len());
        joined.push_str(prefix);
        joined.push_str(template);
        Self::parse(&joined)
    }

    fn check_unique_params(template: &str, segments: &[Segment]) -> Result<(), TemplateError> {
        let mut names: SmallVec<[&str; 8]> = SmallVec::new();
        for seg in segments {
            if let Segment::Param(name) = seg {
                if names.contains(&name.as_ref()) {
                    return Err(TemplateError::DuplicateParameter {
                        template: template.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name.as_ref());
            }
        }
        Ok(())
    }

    fn parse_segment(template: &str, position: usize, part: &str) -> Result<Segment, TemplateError> {
        if part.is_empty() {
            return Err(TemplateError::EmptySegment {
                template: template.to_string(),
                position,
            });
        }
        let malformed = || TemplateError::MalformedSegment {
            template: template.to_string(),
            segment: part.to_string(),
        };
        match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) if !name.is_empty() && !name.contains(['{', '}']) => {
                Ok(Segment::Param(Arc::from(name)))
            }
            Some(_) => Err(malformed()),
            None if part.contains(['{', '}']) => Err(malformed()),
            None => Ok(Segment::Literal(Arc::from(part))),
        }
    }

    /// The template as written (including any mount prefix)
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments, root first
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in declaration order
    pub fn param_names(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        })
    }

    /// Number of placeholders
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_param()).count()
    }

    /// Same literal/placeholder structure, ignoring placeholder names
    #[must_use]
    pub fn same_shape(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Precedence between two templates that could match the same path
    ///
    /// Compares left to right; at the first position where one template has a
    /// literal and the other a placeholder, the literal sorts first
    /// (`Ordering::Less` means `self` wins). Templates of equal shape compare
    /// `Equal`; literal text breaks remaining ties so the order is total.
    #[must_use]
    pub fn precedence_cmp(&self, other: &PathTemplate) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                (Segment::Literal(_), Segment::Param(_)) => return Ordering::Less,
                (Segment::Param(_), Segment::Literal(_)) => return Ordering::Greater,
                (Segment::Literal(x), Segment::Literal(y)) if x != y => return x.cmp(y),
                _ => {}
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }

    /// Match a concrete path against this template alone
    ///
    /// Returns the captured `(name, value)` pairs in declaration order.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<ParamVec> {
        let parts = split_path(path)?;
        self.match_segments(&parts)
    }

    pub(crate) fn match_segments(&self, parts: &[&str]) -> Option<ParamVec> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = ParamVec::new();
        for (seg, part) in self.segments.iter().zip(parts) {
            match seg {
                Segment::Literal(lit) if lit.as_ref() == *part => {}
                Segment::Param(name) if !part.is_empty() => {
                    params.push((Arc::clone(name), (*part).to_string()));
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split an absolute concrete path into segments
///
/// No normalization is applied: `/a//b` and `/a/b/` keep their empty segments,
/// which can only ever match nothing. Returns `None` for relative paths.
pub(crate) fn split_path(path: &str) -> Option<PathSegments<'_>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(PathSegments::new());
    }
    Some(rest.split('/').collect())
}
