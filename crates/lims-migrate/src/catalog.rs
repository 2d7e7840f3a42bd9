//! Table names of the LIMS schema.
//!
//! The copy and reset lists are maintained by hand. Both can be overridden in
//! the `migration` section of the configuration file.

/// Prefix shared by every LIMS table.
pub const TABLE_PREFIX: &str = "lims_";

/// Tables copied by `migrate`, without prefix, in copy order.
///
/// `basesetting` is deliberately absent: the new system ships its own.
pub const MIGRATE_TABLES: &[&str] = &[
    "user",
    "lab",
    "equipments",
    "equipment_child",
    "flow_bind",
    "flow_bind_data",
    "blacklist",
    "blacklist_log",
    "filepath",
    "flow",
    "flow_audit",
    "flow_bind_equipmentdata",
    "flow_bind_time",
    "flow_node",
    "lab_safe_check",
    "labs",
    "message",
    "order",
    "order_equipment",
    "order_log",
    "record_data",
];

/// Tables cleared by `reset`, fully qualified, in delete order.
pub const RESET_TABLES: &[&str] = &[
    "lims_lab",
    "lims_user",
    "lims_equipment_child",
    "lims_equipments",
    "lims_flow_bind",
    "lims_flow_bind_data",
    "lims_basesetting",
    "lims_blacklist",
    "lims_blacklist_log",
    "lims_filepath",
    "lims_flow",
    "lims_flow_bind_equipmentdata",
    "lims_flow_bind_time",
    "lims_flow_node",
    "lims_lab_safe_check",
    "lims_labs",
    "lims_message",
    "lims_order",
    "lims_order_equipment",
    "lims_order_log",
    "lims_record_data",
];

pub const ORDER_TABLE: &str = "lims_order";
pub const USER_TABLE: &str = "lims_user";
pub const LAB_TABLE: &str = "lims_lab";
pub const EQUIPMENT_TABLE: &str = "lims_equipments";
pub const FLOW_BIND_TABLE: &str = "lims_flow_bind";
pub const FLOW_BIND_DATA_TABLE: &str = "lims_flow_bind_data";

/// Order `type` value for lab reservations; everything else is equipment.
pub const ORDER_TYPE_LAB: &str = "lab";

/// Flow id column in `lims_flow_bind_data`.
pub const FLOW_BIND_DATA_FLOW_COLUMN: &str = "flowid";
/// Flow id column in `lims_order`.
pub const ORDER_FLOW_COLUMN: &str = "flow_id";

/// Default copy list as owned strings.
pub fn default_migrate_tables() -> Vec<String> {
    MIGRATE_TABLES.iter().map(|t| t.to_string()).collect()
}

/// Default reset list as owned strings.
pub fn default_reset_tables() -> Vec<String> {
    RESET_TABLES.iter().map(|t| t.to_string()).collect()
}
