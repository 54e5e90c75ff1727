//! Garment catalog types: categories, layering order, items.
//!
//! Catalog records arrive with free-text category strings; those are
//! mapped into a closed enum so every downstream dispatch (geometry,
//! layering) is exhaustive. Unknown strings land in a documented
//! default bucket instead of failing silently.

use serde::{Deserialize, Serialize};

use crate::types::RgbaImage;

/// Closed set of garment categories.
///
/// The variants cover the catalog's fixed vocabulary; anything else
/// maps to [`Other`](Self::Other), which gets mid-layer z-order and a
/// generic placement rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GarmentCategory {
    Underwear,
    TShirt,
    Shirt,
    Knit,
    Hoodie,
    Jacket,
    Coat,
    Puffer,
    Pants,
    Shorts,
    Skirt,
    Dress,
    Accessory,
    Bag,
    /// Default bucket for unrecognized catalog strings.
    Other,
}

impl GarmentCategory {
    /// Map a free-text catalog category to the closed set.
    ///
    /// Matching is case-insensitive and tolerant of common synonyms.
    /// Unknown strings become [`Other`](Self::Other).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "underwear" | "undergarment" => Self::Underwear,
            "t-shirt" | "tshirt" | "tee" => Self::TShirt,
            "shirt" | "blouse" => Self::Shirt,
            "knit" | "knitwear" | "sweater" => Self::Knit,
            "hoodie" | "sweatshirt" => Self::Hoodie,
            "jacket" | "outerwear" => Self::Jacket,
            "coat" | "overcoat" => Self::Coat,
            "puffer" | "down" | "down-jacket" => Self::Puffer,
            "pants" | "trousers" | "jeans" => Self::Pants,
            "shorts" => Self::Shorts,
            "skirt" => Self::Skirt,
            "dress" | "one-piece" => Self::Dress,
            "accessory" | "accessories" => Self::Accessory,
            "bag" | "handbag" | "backpack" => Self::Bag,
            _ => Self::Other,
        }
    }

    /// Drawing priority: lower draws first, higher occludes.
    ///
    /// Matches real dressing order -- undergarments first, mid-layer
    /// garments over them, outerwear over those, accessories and bags
    /// on top of everything.
    #[must_use]
    pub const fn z_priority(self) -> u8 {
        match self {
            Self::Underwear => 0,
            Self::TShirt
            | Self::Shirt
            | Self::Knit
            | Self::Hoodie
            | Self::Pants
            | Self::Shorts
            | Self::Skirt
            | Self::Dress
            | Self::Other => 1,
            Self::Jacket | Self::Coat | Self::Puffer => 2,
            Self::Accessory => 3,
            Self::Bag => 4,
        }
    }

    /// Whether this category anchors at the shoulders (upper body).
    #[must_use]
    pub const fn is_upper_body(self) -> bool {
        matches!(
            self,
            Self::Underwear
                | Self::TShirt
                | Self::Shirt
                | Self::Knit
                | Self::Hoodie
                | Self::Jacket
                | Self::Coat
                | Self::Puffer
                | Self::Dress
        )
    }

    /// Whether this category anchors at the hips (lower body).
    #[must_use]
    pub const fn is_lower_body(self) -> bool {
        matches!(self, Self::Pants | Self::Shorts | Self::Skirt)
    }
}

/// One garment entering a fitting request.
///
/// The image is an already background-removed cutout (alpha channel
/// populated). Items are created and consumed within a single request;
/// the core never writes back to the catalog.
#[derive(Debug, Clone)]
pub struct GarmentItem {
    /// Catalog identifier, carried through for reporting only.
    pub id: String,
    /// Category, already mapped into the closed set.
    pub category: GarmentCategory,
    /// Background-removed garment art.
    pub image: RgbaImage,
}

impl GarmentItem {
    /// Build an item from a raw catalog record.
    #[must_use]
    pub fn new(id: impl Into<String>, category_label: &str, image: RgbaImage) -> Self {
        Self {
            id: id.into(),
            category: GarmentCategory::from_label(category_label),
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_closed_set() {
        assert_eq!(GarmentCategory::from_label("T-Shirt"), GarmentCategory::TShirt);
        assert_eq!(GarmentCategory::from_label("  hoodie "), GarmentCategory::Hoodie);
        assert_eq!(GarmentCategory::from_label("JEANS"), GarmentCategory::Pants);
        assert_eq!(GarmentCategory::from_label("one-piece"), GarmentCategory::Dress);
        assert_eq!(GarmentCategory::from_label("backpack"), GarmentCategory::Bag);
    }

    #[test]
    fn unknown_labels_land_in_default_bucket() {
        assert_eq!(GarmentCategory::from_label("scarf??"), GarmentCategory::Other);
        assert_eq!(GarmentCategory::from_label(""), GarmentCategory::Other);
    }

    #[test]
    fn dressing_order_is_monotone() {
        // Underwear below tops, tops below outerwear, outerwear below
        // accessories and bags.
        assert!(GarmentCategory::Underwear.z_priority() < GarmentCategory::TShirt.z_priority());
        assert!(GarmentCategory::TShirt.z_priority() < GarmentCategory::Coat.z_priority());
        assert!(GarmentCategory::Coat.z_priority() < GarmentCategory::Accessory.z_priority());
        assert!(GarmentCategory::Accessory.z_priority() < GarmentCategory::Bag.z_priority());
    }

    #[test]
    fn body_anchors_are_disjoint() {
        for category in [
            GarmentCategory::Underwear,
            GarmentCategory::TShirt,
            GarmentCategory::Shirt,
            GarmentCategory::Knit,
            GarmentCategory::Hoodie,
            GarmentCategory::Jacket,
            GarmentCategory::Coat,
            GarmentCategory::Puffer,
            GarmentCategory::Pants,
            GarmentCategory::Shorts,
            GarmentCategory::Skirt,
            GarmentCategory::Dress,
            GarmentCategory::Accessory,
            GarmentCategory::Bag,
            GarmentCategory::Other,
        ] {
            assert!(
                !(category.is_upper_body() && category.is_lower_body()),
                "{category:?} cannot anchor at both shoulders and hips",
            );
        }
    }

    #[test]
    fn item_maps_label_at_construction() {
        let item = GarmentItem::new("c-42", "sweater", RgbaImage::new(2, 2));
        assert_eq!(item.id, "c-42");
        assert_eq!(item.category, GarmentCategory::Knit);
    }
}
