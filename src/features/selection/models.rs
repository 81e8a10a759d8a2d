use crate::features::catalog::models::{BusLine, Vehicle};
use serde::{Deserialize, Serialize};

/// 路線・車両の選択
///
/// 端末の保存形式（camelCase、値はすべて文字列）と互換性を保つ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusSelection {
    pub bus_line_id: String,
    pub bus_line_name: String,
    pub bus_line_code: String,
    pub bus_line_company: String,
    pub vehicle_prefix: String,
}

impl BusSelection {
    /// 選択した路線と車両から作成する
    pub fn from_catalog(line: &BusLine, vehicle: &Vehicle) -> Self {
        Self {
            bus_line_id: line.id.to_string(),
            bus_line_name: line.name.clone(),
            bus_line_code: line.busline_code.clone(),
            bus_line_company: line.company.map(|c| c.to_string()).unwrap_or_default(),
            vehicle_prefix: vehicle.prefix.clone(),
        }
    }

    /// 路線ID（数値）
    pub fn bus_line_id(&self) -> Option<i64> {
        self.bus_line_id.trim().parse().ok()
    }

    /// 会社ID（数値）
    pub fn company_id(&self) -> Option<i64> {
        self.bus_line_company.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_catalog_and_wire_format() {
        let line = BusLine {
            id: 10,
            name: "Centro".to_string(),
            busline_code: "101".to_string(),
            company: Some(1),
            tariffs: vec![],
        };
        let vehicle = Vehicle {
            prefix: "1020".to_string(),
            company: Some(1),
        };

        let selection = BusSelection::from_catalog(&line, &vehicle);
        assert_eq!(selection.bus_line_id(), Some(10));
        assert_eq!(selection.company_id(), Some(1));

        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["busLineId"], "10");
        assert_eq!(json["vehiclePrefix"], "1020");
    }
}
