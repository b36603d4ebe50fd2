use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
}
