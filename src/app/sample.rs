//! Synthetic product catalog for the viewer.

use pivot_canvas::group::{BucketStrategy, Dimension};
use pivot_canvas::{AttrValue, CatalogItem, ImageDescriptor};

#[derive(Debug, Clone)]
pub struct DemoProduct {
    pub id: String,
    pub name: String,
    pub category: &'static str,
    pub subcategory: &'static str,
    pub brand: &'static str,
    pub season: Option<&'static str>,
    pub price: f64,
    pub storage_id: u64,
    pub aspect: f32,
}

impl CatalogItem for DemoProduct {
    fn id(&self) -> &str {
        &self.id
    }

    fn group_key(&self) -> Option<String> {
        Some(self.category.to_string())
    }

    fn weight(&self) -> Option<f32> {
        Some(self.price as f32)
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn price_text(&self) -> Option<String> {
        Some(format!("€ {:.2}", self.price))
    }

    fn image(&self) -> Option<ImageDescriptor> {
        Some(ImageDescriptor::Storage { id: self.storage_id })
    }

    fn category(&self, level: usize) -> Option<&str> {
        match level {
            0 => Some(self.category),
            1 => Some(self.subcategory),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<AttrValue> {
        match name {
            "brand" => Some(AttrValue::Text(self.brand.to_string())),
            "season" => self.season.map(|s| AttrValue::Text(s.to_string())),
            "price" => Some(AttrValue::Number(self.price)),
            _ => None,
        }
    }

    fn aspect_ratio(&self) -> Option<f32> {
        Some(self.aspect)
    }
}

const TREE: &[(&str, &[&str])] = &[
    ("Bikes", &["Mountain", "Road", "Gravel", "E-Bike"]),
    ("Apparel", &["Jerseys", "Jackets", "Shorts", "Gloves"]),
    ("Helmets", &["Trail", "Road", "Full Face"]),
    ("Components", &["Wheels", "Brakes", "Drivetrain", "Saddles"]),
    ("Accessories", &["Bags", "Lights", "Bottles"]),
];

const BRANDS: &[&str] = &["Apex", "Bergwerk", "Cirrus", "Dune", "Element", "Fjord"];
const SEASONS: &[&str] = &["Spring", "Summer", "Autumn", "Winter"];

/// xorshift64*; the catalog only needs to look varied and stay stable.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next() % items.len() as u64) as usize]
    }

    fn unit(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }
}

pub fn catalog(count: usize, seed: u64) -> Vec<DemoProduct> {
    let mut rng = Rng(seed.max(1));
    (0..count)
        .map(|i| {
            let (category, subs) = *rng.pick(TREE);
            let subcategory = *rng.pick(subs);
            let brand = *rng.pick(BRANDS);
            // Roughly one in eight products has no season.
            let season = (rng.next() % 8 != 0).then(|| *rng.pick(SEASONS));
            let base = match category {
                "Bikes" => 900.0,
                "Components" => 120.0,
                "Helmets" => 80.0,
                _ => 25.0,
            };
            let price = (base * (0.5 + rng.unit() * 3.0) * 100.0).round() / 100.0;
            let aspect = [1.0, 1.0, 0.75, 1.33, 1.5][(rng.next() % 5) as usize];
            DemoProduct {
                id: format!("p{i:04}"),
                name: format!("{brand} {subcategory} {}", i % 97),
                category,
                subcategory,
                brand,
                season,
                price,
                storage_id: 4_000 + i as u64,
                aspect,
            }
        })
        .collect()
}

/// Category → subcategory hierarchy, then flat attribute dimensions.
pub fn dimensions() -> Vec<Dimension> {
    vec![
        Dimension::category("category", "Category", 0),
        Dimension::category("subcategory", "Subcategory", 1).with_parent("category"),
        Dimension::attribute("brand", "Brand", "brand"),
        Dimension::attribute("season", "Season", "season"),
        Dimension::numeric("price", "Price", "price", BucketStrategy::Quantile),
    ]
}
