use serde::{Deserialize, Serialize};

/// A treatment on the salon's menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaService {
    pub id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub price: f64,
}
