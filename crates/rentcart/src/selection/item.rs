//! Selection line items and their identity.

use std::fmt;

use chrono::{DateTime, Utc};
use rentcart_ids::{EquipmentId, SerialNumber};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// Identity of a selection entry.
///
/// Fungible equipment is keyed by catalog id alone, so repeated picks merge
/// into one entry. Serialized units carry their serial and stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    equipment_id: EquipmentId,
    serial_number: Option<SerialNumber>,
}

impl ItemKey {
    pub fn fungible(equipment_id: EquipmentId) -> Self {
        Self {
            equipment_id,
            serial_number: None,
        }
    }

    pub fn unit(equipment_id: EquipmentId, serial_number: SerialNumber) -> Self {
        Self {
            equipment_id,
            serial_number: Some(serial_number),
        }
    }

    /// The serial only takes part in the key for unique units.
    pub fn derive(
        equipment_id: &EquipmentId,
        serial_number: Option<&SerialNumber>,
        is_unique_unit: bool,
    ) -> Self {
        match serial_number {
            Some(serial) if is_unique_unit => Self::unit(equipment_id.clone(), serial.clone()),
            _ => Self::fungible(equipment_id.clone()),
        }
    }

    pub fn for_item(item: &SelectionItem) -> Self {
        Self::derive(
            &item.equipment_id,
            item.serial_number.as_ref(),
            item.is_unique_unit,
        )
    }

    pub fn equipment_id(&self) -> &EquipmentId {
        &self.equipment_id
    }

    pub fn serial_number(&self) -> Option<&SerialNumber> {
        self.serial_number.as_ref()
    }
}

/// Persisted form: `<equipmentId>` or `<equipmentId>_<serialNumber>`.
impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.serial_number {
            Some(serial) => write!(f, "{}_{}", self.equipment_id, serial),
            None => write!(f, "{}", self.equipment_id),
        }
    }
}

fn default_quantity() -> u32 {
    1
}

/// One line of the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub equipment_id: EquipmentId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial_number: Option<SerialNumber>,
    #[serde(default)]
    pub is_unique_unit: bool,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub daily_rate: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub replacement_cost: Decimal,
    /// Per-item override of the booking period.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl SelectionItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::for_item(self)
    }

    /// Per-day cost of this line at its current quantity.
    pub fn daily_total(&self) -> Decimal {
        self.daily_rate * Decimal::from(self.quantity)
    }

    pub fn replacement_total(&self) -> Decimal {
        self.replacement_cost * Decimal::from(self.quantity)
    }
}

/// An unvalidated item offered to the engine by search, catalog or scanner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCandidate {
    pub equipment_id: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub is_unique_unit: bool,
    /// Units to add; `None` means one.
    pub quantity: Option<u32>,
    pub daily_rate: Decimal,
    pub replacement_cost: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ItemCandidate {
    pub fn new(equipment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// A serialized unit, as produced by a barcode scan.
    pub fn unit(
        equipment_id: impl Into<String>,
        name: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            serial_number: Some(serial_number.into()),
            is_unique_unit: true,
            ..Self::new(equipment_id, name)
        }
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn daily_rate(mut self, rate: Decimal) -> Self {
        self.daily_rate = rate;
        self
    }

    pub fn replacement_cost(mut self, cost: Decimal) -> Self {
        self.replacement_cost = cost;
        self
    }

    pub fn period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Check identity and quantity and build the item it describes.
    pub(crate) fn validate(self, added_at: DateTime<Utc>) -> Result<SelectionItem, SelectionError> {
        let equipment_id = EquipmentId::parse(&self.equipment_id)
            .map_err(|_| SelectionError::validation("item has no equipment id"))?;
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SelectionError::validation(format!(
                "item {} has no name",
                equipment_id
            )));
        }
        if self.quantity == Some(0) {
            return Err(SelectionError::validation(format!(
                "item {} has zero quantity",
                equipment_id
            )));
        }
        if self.daily_rate.is_sign_negative() || self.replacement_cost.is_sign_negative() {
            return Err(SelectionError::validation(format!(
                "item {} has a negative price",
                equipment_id
            )));
        }

        let serial_number = self
            .serial_number
            .as_deref()
            .and_then(|s| SerialNumber::parse(s).ok());
        let quantity = if self.is_unique_unit {
            1
        } else {
            self.quantity.unwrap_or(1)
        };

        Ok(SelectionItem {
            equipment_id,
            name: name.to_string(),
            serial_number,
            is_unique_unit: self.is_unique_unit,
            quantity,
            daily_rate: self.daily_rate,
            replacement_cost: self.replacement_cost,
            start_date: self.start_date,
            end_date: self.end_date,
            added_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(id: &str) -> EquipmentId {
        EquipmentId::parse(id).unwrap()
    }

    #[test]
    fn test_key_display_matches_persisted_form() {
        let serial = SerialNumber::parse("SN-77").unwrap();
        assert_eq!(ItemKey::fungible(eq("CAM-1")).to_string(), "CAM-1");
        assert_eq!(ItemKey::unit(eq("CAM-1"), serial).to_string(), "CAM-1_SN-77");
    }

    #[test]
    fn test_serial_ignored_for_fungible_items() {
        let serial = SerialNumber::parse("SN-1").unwrap();
        let key = ItemKey::derive(&eq("CABLE"), Some(&serial), false);
        assert_eq!(key, ItemKey::fungible(eq("CABLE")));

        let unit = ItemKey::derive(&eq("CAM"), Some(&serial), true);
        assert_eq!(unit.serial_number(), Some(&serial));
    }

    #[test]
    fn test_unique_unit_without_serial_keys_by_id() {
        let key = ItemKey::derive(&eq("LENS-9"), None, true);
        assert_eq!(key, ItemKey::fungible(eq("LENS-9")));
    }

    #[test]
    fn test_structural_keys_avoid_concatenation_clash() {
        // "A_B" + no serial and "A" + serial "B" print the same but differ.
        let fungible = ItemKey::fungible(eq("A_B"));
        let unit = ItemKey::unit(eq("A"), SerialNumber::parse("B").unwrap());
        assert_eq!(fungible.to_string(), unit.to_string());
        assert_ne!(fungible, unit);
    }

    #[test]
    fn test_validate_rejects_missing_identity_and_name() {
        let now = Utc::now();
        assert!(matches!(
            ItemCandidate::new("", "Camera").validate(now),
            Err(SelectionError::Validation(_))
        ));
        assert!(matches!(
            ItemCandidate::new("CAM-1", "  ").validate(now),
            Err(SelectionError::Validation(_))
        ));
        assert!(matches!(
            ItemCandidate::new("CAM-1", "Camera").quantity(0).validate(now),
            Err(SelectionError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_pins_unique_units_to_one() {
        let item = ItemCandidate::unit("CAM-1", "Camera", "SN-1")
            .quantity(5)
            .validate(Utc::now())
            .unwrap();
        assert_eq!(item.quantity, 1);
        assert!(item.is_unique_unit);
    }

    #[test]
    fn test_item_decodes_sparse_legacy_json() {
        let item: SelectionItem =
            serde_json::from_str(r#"{"equipmentId":"CAM-1","dailyRate":12.5}"#).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.daily_rate, Decimal::new(125, 1));
        assert!(item.name.is_empty());
    }
}
