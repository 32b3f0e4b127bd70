//! Two-slot fragment: `#target_file;target_segment`.

use std::fmt;

/// Member and sub-selector addressed inside a container resource.
///
/// `archive.zip#file.xlsx;0` addresses worksheet `0` of `file.xlsx` inside
/// the archive. Either slot may be set alone; a segment without a file
/// serializes as `#;segment` so slot order survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fragment {
    pub target_file: Option<String>,
    pub target_segment: Option<String>,
}

impl Fragment {
    /// Parses the text after `#`. Empty slots become `None`.
    pub fn parse(s: &str) -> Self {
        let (file, segment) = match s.split_once(';') {
            Some((f, seg)) => (f, Some(seg)),
            None => (s, None),
        };
        Fragment {
            target_file: non_empty(file),
            target_segment: segment.and_then(non_empty),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target_file.is_none() && self.target_segment.is_none()
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.target_file {
            f.write_str(file)?;
        }
        if let Some(segment) = &self.target_segment {
            write!(f, ";{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_segment() {
        let frag = Fragment::parse("file.xlsx;2");
        assert_eq!(frag.target_file.as_deref(), Some("file.xlsx"));
        assert_eq!(frag.target_segment.as_deref(), Some("2"));
        assert_eq!(frag.to_string(), "file.xlsx;2");
    }

    #[test]
    fn segment_only_keeps_slot_order() {
        let frag = Fragment {
            target_file: None,
            target_segment: Some("sheet1".into()),
        };
        assert_eq!(frag.to_string(), ";sheet1");
        assert_eq!(Fragment::parse(&frag.to_string()), frag);
    }

    #[test]
    fn empty_slots_are_unset() {
        assert!(Fragment::parse("").is_empty());
        assert!(Fragment::parse(";").is_empty());
        let frag = Fragment::parse("a;");
        assert_eq!(frag.target_file.as_deref(), Some("a"));
        assert_eq!(frag.target_segment, None);
    }
}
