use std::fmt;

use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize, Serialize,
};

pub const PREDICT_PATH: &str = "predict";

pub const PREDICT_FILE_FIELD: &str = "file";

/// Successful `/predict` body. The code is kept raw; range checks belong to
/// the roast catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(deserialize_with = "class_code")]
    pub class: i64,
}

// Integers outside the i64 range saturate so they fail as unknown codes
// rather than as unreadable bodies.
fn class_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct ClassCode;

    impl<'de> Visitor<'de> for ClassCode {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer class code")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            Ok(i64::try_from(v).unwrap_or(i64::MAX))
        }

        // serde_json hands integer literals past u64 over as floats.
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            if v.is_finite() && v.fract() == 0.0 && v.abs() >= i64::MAX as f64 {
                Ok(if v.is_sign_negative() { i64::MIN } else { i64::MAX })
            } else {
                Err(E::invalid_type(de::Unexpected::Float(v), &self))
            }
        }
    }

    deserializer.deserialize_any(ClassCode)
}
