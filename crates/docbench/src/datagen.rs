use bson::{Bson, Document, doc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const STATUSES: &[&str] = &["active", "inactive", "pending"];
const DEPARTMENTS: &[&str] = &["engineering", "sales", "support", "finance", "ops"];
const CITIES: &[&str] = &["Oslo", "Bergen", "Lisbon", "Porto", "Austin", "Denver"];
const TAGS: &[&str] = &["new", "vip", "trial", "churn-risk", "partner", "beta"];

/// Seeded generator, so every adapter sees the same dataset for a given seed.
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn person(&mut self, seq: usize) -> Document {
        let rng = &mut self.rng;
        let tag_count = rng.gen_range(0..=3);
        let tags: Vec<Bson> = (0..tag_count)
            .map(|_| Bson::String(TAGS[rng.gen_range(0..TAGS.len())].to_string()))
            .collect();

        let mut doc = doc! {
            "name": format!("user-{seq}"),
            "email": format!("user{seq}@example.com"),
            "age": rng.gen_range(18..80_i32),
            "status": STATUSES[rng.gen_range(0..STATUSES.len())],
            "department": DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())],
            "score": (rng.gen_range(0.0..100.0_f64) * 100.0).round() / 100.0,
            "visits": rng.gen_range(0..500_i64),
            "tags": tags,
            "address": {
                "city": CITIES[rng.gen_range(0..CITIES.len())],
                "zip": format!("{:05}", rng.gen_range(0..100_000)),
            },
        };

        // Optional fields, left out rather than set to null.
        if rng.gen_ratio(7, 10) {
            doc.insert("last_login", rng.gen_range(1_700_000_000..1_740_000_000_i64));
        }
        if rng.gen_bool(0.3) {
            doc.insert("notes", format!("Note for user {seq}"));
        }
        doc
    }

    pub fn people(&mut self, count: usize) -> Vec<Document> {
        (0..count).map(|seq| self.person(seq)).collect()
    }
}
