//! Built-in reference data: grocery categories, a starter product list and
//! the default payment terms.

/// Categories offered when creating products.
pub const PRODUCT_CATEGORIES: [&str; 10] = [
    "Pulses & Dals",
    "Spices & Masalas",
    "Flour & Grains",
    "Sugar & Sweeteners",
    "Oil & Ghee",
    "Rice & Cereals",
    "Salt & Condiments",
    "Tea & Coffee",
    "Snacks",
    "Other",
];

/// A staple product that can be added to the catalog in one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogProduct {
    pub name: &'static str,
    pub category: &'static str,
    pub unit: &'static str,
    pub price: f64,
}

const fn staple(
    name: &'static str,
    category: &'static str,
    unit: &'static str,
    price: f64,
) -> CatalogProduct {
    CatalogProduct {
        name,
        category,
        unit,
        price,
    }
}

/// Staples added by [`crate::Ledger::add_common_products`].
pub const COMMON_PRODUCTS: [CatalogProduct; 16] = [
    staple("Toor Dal", "Pulses & Dals", "kg", 120.0),
    staple("Moong Dal", "Pulses & Dals", "kg", 140.0),
    staple("Chana Dal", "Pulses & Dals", "kg", 90.0),
    staple("Turmeric Powder", "Spices & Masalas", "g", 2.0),
    staple("Red Chili Powder", "Spices & Masalas", "g", 3.0),
    staple("Cumin Seeds", "Spices & Masalas", "g", 4.0),
    staple("Wheat Flour", "Flour & Grains", "kg", 45.0),
    staple("Rice Flour", "Flour & Grains", "kg", 50.0),
    staple("Sugar", "Sugar & Sweeteners", "kg", 42.0),
    staple("Jaggery", "Sugar & Sweeteners", "kg", 65.0),
    staple("Mustard Oil", "Oil & Ghee", "L", 180.0),
    staple("Sunflower Oil", "Oil & Ghee", "L", 150.0),
    staple("Basmati Rice", "Rice & Cereals", "kg", 120.0),
    staple("Regular Rice", "Rice & Cereals", "kg", 50.0),
    staple("Salt", "Salt & Condiments", "kg", 20.0),
    staple("Tea Leaves", "Tea & Coffee", "g", 1.5),
];

/// `(name, days)` pairs seeded when a ledger has no payment terms.
pub const DEFAULT_PAYMENT_TERMS: [(&str, u32); 3] =
    [("Weekly", 7), ("Monthly", 30), ("6 Months", 180)];
