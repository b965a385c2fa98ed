use serde::{Deserialize, Serialize};

/// Pagination envelope returned by list endpoints.
///
/// All three fields are required; a response missing any of them fails to
/// deserialize instead of leaking half-populated pages to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    // API returns decimals as strings (e.g. "19.99")
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub user: Option<ReviewAuthor>,
}

impl Resource {
    pub fn rating(&self) -> f64 {
        self.average_rating.unwrap_or(0.0)
    }

    pub fn in_stock(&self) -> bool {
        self.stock.unwrap_or(0) > 0
    }

    pub fn stock_display(&self) -> String {
        match self.stock {
            Some(n) if n > 0 => format!("Stock: {}", n),
            _ => "Out of stock".to_string(),
        }
    }

    pub fn price_display(&self) -> String {
        match self.price {
            Some(p) => format!("${:.2}", p),
            None => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user: Option<ReviewAuthor>,
}

impl Review {
    pub fn author_display(&self) -> &str {
        self.user.as_ref().map(|u| u.name.as_str()).unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAuthor {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

/// Payload for creating or updating a review.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// Helper to deserialize a number or numeric string as Option<f64>
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct DecimalVisitor;

    impl<'de> de::Visitor<'de> for DecimalVisitor {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or numeric string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid decimal: {}", v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}
