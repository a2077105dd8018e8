use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    /// Plan-shape heuristic input; `None` for a degenerate width.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width <= 0.0 {
            return None;
        }
        Some(self.length / self.width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaModel {
    pub id: String,
    pub name: String,
    pub dimensions: Dimensions,
    pub capacity: u32,
    pub price: f64,
    pub image_url: String,
    pub colors: Vec<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub product_url: Option<String>,
}

impl SpaModel {
    /// Returns a copy with `color` selected, matched case-insensitively against the
    /// available colors. Unknown colors are rejected.
    pub fn with_color(&self, color: &str) -> Option<SpaModel> {
        let wanted = color.trim();
        let chosen = self
            .colors
            .iter()
            .find(|available| available.eq_ignore_ascii_case(wanted))?;
        let mut spa = self.clone();
        spa.selected_color = Some(chosen.clone());
        Some(spa)
    }

    pub fn size_label(&self) -> String {
        format!("{}m × {}m", self.dimensions.length, self.dimensions.width)
    }

    pub fn price_label(&self) -> String {
        let whole = self.price.round() as u64;
        let digits = whole.to_string();
        let mut grouped = String::new();
        for (index, ch) in digits.chars().enumerate() {
            if index > 0 && (digits.len() - index) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("${grouped}")
    }
}

struct BuiltinSpa {
    id: &'static str,
    name: &'static str,
    dimensions: (f64, f64, f64),
    capacity: u32,
    price: f64,
    colors: &'static [&'static str],
    sku: &'static str,
    tags: &'static [&'static str],
    product_path: &'static str,
}

const PRODUCT_BASE_URL: &str = "https://portablespas.co.nz/products/";

const BUILTIN_SPAS: &[BuiltinSpa] = &[
    BuiltinSpa {
        id: "bergen",
        name: "Bergen Portable Spa",
        dimensions: (2.04, 2.04, 0.8),
        capacity: 6,
        price: 949.0,
        colors: &["Arctic White", "Teak", "Charcoal Grey"],
        sku: "A083021",
        tags: &["budget-friendly", "easy setup", "round"],
        product_path: "bergen-spa",
    },
    BuiltinSpa {
        id: "tekapo",
        name: "Tekapo Portable Spa",
        dimensions: (1.85, 1.85, 0.8),
        capacity: 6,
        price: 1099.0,
        colors: &["Pure White", "Lake Blue", "Storm Grey"],
        sku: "A083019",
        tags: &["entry-level", "affordable", "square"],
        product_path: "tekapo-spa",
    },
    BuiltinSpa {
        id: "camaro",
        name: "Camaro Portable Spa",
        dimensions: (2.1, 2.1, 0.85),
        capacity: 4,
        price: 1099.0,
        colors: &["Pearl White", "Racing Red", "Carbon Black"],
        sku: "SPA-P-CA063",
        tags: &["mid-range", "enhanced features", "4-person"],
        product_path: "camaro-spa",
    },
    BuiltinSpa {
        id: "mono-eco-6",
        name: "Mono-Eco 6 Portable Spa",
        dimensions: (1.73, 1.73, 0.9),
        capacity: 6,
        price: 1999.0,
        colors: &["Eco White", "Forest Green", "Stone Grey"],
        sku: "F-MO062WE",
        tags: &["eco-friendly", "energy-efficient", "round"],
        product_path: "mono-spa-6-person-store-demo-pick-up-christchurch-only-copy",
    },
    BuiltinSpa {
        id: "mono-eco-8",
        name: "Mono-Eco 8 Portable Spa",
        dimensions: (1.92, 1.92, 0.95),
        capacity: 8,
        price: 2599.0,
        colors: &["Alpine White", "Sapphire Blue", "Storm Grey", "Sandstone"],
        sku: "A083515",
        tags: &["large-family", "spacious", "round"],
        product_path: "mono-spa-190",
    },
    BuiltinSpa {
        id: "oslo",
        name: "Oslo Portable Spa",
        dimensions: (1.80, 1.80, 0.9),
        capacity: 6,
        price: 3399.0,
        colors: &["Nordic White", "Midnight Blue", "Charcoal"],
        sku: "F-OS063W",
        tags: &["luxury", "premium", "hydro jets", "square"],
        product_path: "oslo-spa-new-improved",
    },
    BuiltinSpa {
        id: "tuscany",
        name: "Tuscany Portable Spa",
        dimensions: (2.3, 2.3, 0.95),
        capacity: 4,
        price: 1999.0,
        colors: &["Ivory", "Terracotta", "Graphite"],
        sku: "F-TU062W",
        tags: &["flagship", "ultimate premium", "4-person"],
        product_path: "tuscany-spa-copy",
    },
];

pub fn builtin_spa_models() -> Vec<SpaModel> {
    BUILTIN_SPAS
        .iter()
        .map(|entry| {
            let (length, width, height) = entry.dimensions;
            SpaModel {
                id: entry.id.to_string(),
                name: entry.name.to_string(),
                dimensions: Dimensions {
                    length,
                    width,
                    height,
                },
                capacity: entry.capacity,
                price: entry.price,
                image_url: format!("/spa-images/{}.png", entry.id),
                colors: entry.colors.iter().map(|color| color.to_string()).collect(),
                selected_color: None,
                sku: Some(entry.sku.to_string()),
                tags: entry.tags.iter().map(|tag| tag.to_string()).collect(),
                product_url: Some(format!("{PRODUCT_BASE_URL}{}", entry.product_path)),
            }
        })
        .collect()
}
