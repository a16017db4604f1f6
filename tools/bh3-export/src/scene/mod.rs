//! glTF documents <-> abstract scene graph

pub mod glb;
pub mod gltf;

use serde::Deserialize;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub use self::glb::{scene_to_glb, write_glb};
pub use self::gltf::{load_scene, read_document};

/// Picks a scene or an animation by index or by case-insensitive name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Index(usize),
    Name(String),
}

impl Selector {
    /// Position of the first entry matching this selector.
    ///
    /// A name that matches nothing is retried as an index when it parses as one.
    pub fn find<'a>(&self, names: impl IntoIterator<Item = Option<&'a str>>) -> Option<usize> {
        let names: Vec<Option<&str>> = names.into_iter().collect();
        match self {
            Selector::Index(index) => (*index < names.len()).then_some(*index),
            Selector::Name(name) => names
                .iter()
                .position(|n| n.is_some_and(|n| n.eq_ignore_ascii_case(name)))
                .or_else(|| {
                    name.parse::<usize>()
                        .ok()
                        .filter(|&index| index < names.len())
                }),
        }
    }
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) => Selector::Index(index),
            Err(_) => Selector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "#{}", index),
            Selector::Name(name) => write!(f, "{:?}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse() {
        assert_eq!("2".parse::<Selector>().unwrap(), Selector::Index(2));
        assert_eq!(
            "Walk".parse::<Selector>().unwrap(),
            Selector::Name("Walk".into())
        );
    }

    #[test]
    fn test_selector_find() {
        let names = [Some("Idle"), None, Some("Walk")];
        assert_eq!(Selector::Name("walk".into()).find(names), Some(2));
        assert_eq!(Selector::Index(1).find(names), Some(1));
        assert_eq!(Selector::Index(3).find(names), None);
        assert_eq!(Selector::Name("Run".into()).find(names), None);
        assert_eq!(Selector::Name("0".into()).find(names), Some(0));
    }
}
