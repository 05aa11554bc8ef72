//! Column names of the service-call export and the fixed output layout.

/// Customer name the filter matches exactly.
pub const CUSTOMER_NAME: &str = "客戶名稱";
/// Customer unit; rows without one are dropped.
pub const CUSTOMER_UNIT: &str = "客戶單位";
/// Contract number; rows without one are dropped.
pub const CONTRACT_NUMBER: &str = "合約編號";
pub const SERVICE_TYPE: &str = "服務類型";
/// Dispatch number, the correlation key for adjacent-duplicate collapse.
pub const DISPATCH_NUMBER: &str = "出勤編號";

/// Columns that must carry a non-blank value for a row to be kept.
pub const REQUIRED_COLUMNS: [&str; 2] = [CUSTOMER_UNIT, CONTRACT_NUMBER];

/// Output layout shared by the header and every published record.
pub const OUTPUT_SCHEMA: [&str; 20] = [
    CONTRACT_NUMBER,
    CUSTOMER_UNIT,
    "到場時間",
    SERVICE_TYPE,
    "叫修說明",
    "處理說明",
    "是否更換備品",
    "更換備品",
    "工程師完成狀態",
    "到場工程師",
    "處理時間(時)",
    "廠牌1",
    "型號1",
    "序號1",
    "廠牌2",
    "型號2",
    "序號2",
    "廠牌3",
    "型號3",
    "序號3",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_output_schema_has_unique_names() {
        let unique: HashSet<_> = OUTPUT_SCHEMA.iter().collect();
        assert_eq!(unique.len(), OUTPUT_SCHEMA.len());
        assert_eq!(OUTPUT_SCHEMA[0], CONTRACT_NUMBER);
        assert_eq!(OUTPUT_SCHEMA[3], SERVICE_TYPE);
    }
}
