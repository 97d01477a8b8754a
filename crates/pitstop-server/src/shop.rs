//! The shop record and its request payload.

use pitstop_client::{Row, SqlValue, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Columns of the `shop` table, in insert order, excluding `id`.
pub const SHOP_COLUMNS: &str = "shop_number, address, highway, exit_number, city, \
     state_cd, zipcode, phone, lat, lng, division, district";

/// One row of the shop directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    /// Primary key.
    pub id: Uuid,
    /// Store number, unique per shop.
    pub shop_number: i32,
    /// Street address.
    pub address: String,
    /// Nearest highway.
    pub highway: String,
    /// Highway exit.
    pub exit_number: String,
    /// City.
    pub city: String,
    /// Two-letter state code.
    pub state_cd: String,
    /// ZIP code.
    pub zipcode: String,
    /// Phone number.
    pub phone: String,
    /// Latitude, if geocoded.
    pub lat: Option<f64>,
    /// Longitude, if geocoded.
    pub lng: Option<f64>,
    /// Company division.
    pub division: i32,
    /// Company district.
    pub district: i32,
}

impl Shop {
    /// Map a result row by column name.
    pub fn from_row(row: &Row) -> pitstop_client::Result<Self> {
        Ok(Self {
            id: row.try_get_by_name("id")?,
            shop_number: row.try_get_by_name("shop_number")?,
            address: row.try_get_by_name("address")?,
            highway: row.try_get_by_name("highway")?,
            exit_number: row.try_get_by_name("exit_number")?,
            city: row.try_get_by_name("city")?,
            state_cd: row.try_get_by_name("state_cd")?,
            zipcode: row.try_get_by_name("zipcode")?,
            phone: row.try_get_by_name("phone")?,
            lat: row.try_get_by_name("lat")?,
            lng: row.try_get_by_name("lng")?,
            division: row.try_get_by_name("division")?,
            district: row.try_get_by_name("district")?,
        })
    }
}

/// Request body for creating or updating a shop.
///
/// Every field is optional; absent text fields coalesce to empty strings,
/// absent numbers to zero, and absent coordinates stay null. Updates
/// additionally require `id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopPayload {
    /// Row to update; ignored on create.
    pub id: Option<Uuid>,
    /// Store number.
    pub shop_number: i32,
    /// Street address.
    pub address: String,
    /// Nearest highway.
    pub highway: String,
    /// Highway exit.
    pub exit_number: String,
    /// City.
    pub city: String,
    /// Two-letter state code.
    pub state_cd: String,
    /// ZIP code.
    pub zipcode: String,
    /// Phone number.
    pub phone: String,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lng: Option<f64>,
    /// Company division.
    pub division: i32,
    /// Company district.
    pub district: i32,
}

impl ShopPayload {
    /// Bind the twelve column values, in [`SHOP_COLUMNS`] order.
    #[must_use]
    pub fn params(&self) -> Vec<SqlValue> {
        params![
            self.shop_number,
            self.address.clone(),
            self.highway.clone(),
            self.exit_number.clone(),
            self.city.clone(),
            self.state_cd.clone(),
            self.zipcode.clone(),
            self.phone.clone(),
            self.lat,
            self.lng,
            self.division,
            self.district,
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_coalesce() {
        let payload: ShopPayload = serde_json::from_str(r#"{"shopNumber": 42}"#).unwrap();
        assert_eq!(payload.shop_number, 42);
        assert_eq!(payload.address, "");
        assert_eq!(payload.division, 0);
        assert_eq!(payload.lat, None);
        assert_eq!(payload.id, None);

        let values = payload.params();
        assert_eq!(values.len(), 12);
        assert_eq!(values[0], SqlValue::Int4(42));
        assert_eq!(values[1], SqlValue::Text(String::new()));
        assert_eq!(values[8], SqlValue::Null);
    }

    #[test]
    fn shop_serializes_camel_case() {
        let shop = Shop {
            id: Uuid::nil(),
            shop_number: 7,
            address: "1 Main St".into(),
            highway: "I-35".into(),
            exit_number: "111".into(),
            city: "Ames".into(),
            state_cd: "IA".into(),
            zipcode: "50010".into(),
            phone: "".into(),
            lat: None,
            lng: None,
            division: 1,
            district: 2,
        };
        let json = serde_json::to_value(&shop).unwrap();
        assert_eq!(json["shopNumber"], 7);
        assert_eq!(json["stateCd"], "IA");
        assert!(json["lat"].is_null());
    }
}
