use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;

/// Worn items that can be attached to a tracked subject.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Mask,
    Helmet,
    Hat,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Mask, Attribute::Helmet, Attribute::Hat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Mask => "mask",
            Attribute::Helmet => "helmet",
            Attribute::Hat => "hat",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mask" => Ok(Attribute::Mask),
            "helmet" => Ok(Attribute::Helmet),
            "hat" => Ok(Attribute::Hat),
            _ => Err(()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Attributes {
    pub mask: bool,
    pub helmet: bool,
    pub hat: bool,
}

impl Attributes {
    #[inline]
    pub fn get(&self, attr: Attribute) -> bool {
        match attr {
            Attribute::Mask => self.mask,
            Attribute::Helmet => self.helmet,
            Attribute::Hat => self.hat,
        }
    }

    #[inline]
    pub fn set(&mut self, attr: Attribute, value: bool) {
        match attr {
            Attribute::Mask => self.mask = value,
            Attribute::Helmet => self.helmet = value,
            Attribute::Hat => self.hat = value,
        }
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.mask || self.helmet || self.hat
    }

    pub fn iter_set(&self) -> impl Iterator<Item = Attribute> + '_ {
        Attribute::ALL.into_iter().filter(move |a| self.get(*a))
    }
}

/// A worn item belongs to a subject when its center falls inside the subject's
/// box, or when the two boxes share a positive area.
pub fn overlaps(subject: &BBox<Ltrb>, item: &BBox<Ltrb>) -> bool {
    subject.contains(&item.center()) || subject.intersects(item)
}

/// Recomputes the attribute flags of a subject from this frame's detections.
/// Detections whose class is not an [`Attribute`] are ignored.
pub fn collect(subject: &BBox<Ltrb>, detections: &[Detection]) -> Attributes {
    let mut attrs = Attributes::default();

    for det in detections {
        if let Ok(attr) = det.class.parse::<Attribute>() {
            if !attrs.get(attr) && det.bbox.is_valid() && overlaps(subject, &det.bbox) {
                attrs.set(attr, true);
            }
        }
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_flags_default_to_false() {
        let attrs: Attributes = serde_json::from_str(r#"{"helmet":true}"#).unwrap();

        assert!(attrs.helmet);
        assert!(!attrs.mask);
        assert!(!attrs.hat);
    }

    #[test]
    fn collects_overlapping_items_only() {
        let person = BBox::ltrb(100.0, 100.0, 200.0, 400.0);
        let dets = vec![
            Detection::new(BBox::ltrb(130.0, 100.0, 170.0, 140.0), "helmet", 0.9),
            Detection::new(BBox::ltrb(500.0, 100.0, 540.0, 140.0), "mask", 0.9),
            Detection::new(BBox::ltrb(120.0, 120.0, 180.0, 180.0), "person", 0.9),
        ];

        let attrs = collect(&person, &dets);

        assert!(attrs.helmet);
        assert!(!attrs.mask);
        assert!(!attrs.hat);
        assert_eq!(attrs.iter_set().collect::<Vec<_>>(), vec![Attribute::Helmet]);
    }

    #[test]
    fn edge_overlap_counts_when_center_is_outside() {
        let person = BBox::ltrb(100.0, 100.0, 200.0, 400.0);
        // center (205, 90) is outside, but the rectangles share area
        let hat = BBox::ltrb(180.0, 80.0, 230.0, 100.5);

        assert!(overlaps(&person, &hat));
        assert!(!overlaps(&person, &BBox::ltrb(200.0, 50.0, 250.0, 100.0)));
    }

    #[test]
    fn parses_class_labels() {
        assert_eq!("hat".parse::<Attribute>(), Ok(Attribute::Hat));
        assert!("person".parse::<Attribute>().is_err());
        assert_eq!(Attribute::Mask.to_string(), "mask");
    }
}
