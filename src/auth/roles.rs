/*!
 * # Roles and Permissions
 *
 * Permissions are `resource:action` strings. Each platform role maps to a
 * fixed permission set; admins additionally bypass permission checks in the
 * middleware layer.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role name constants
pub mod role {
    pub const CUSTOMER: &str = "customer";
    pub const SUPPLIER: &str = "supplier";
    pub const COURIER: &str = "courier";
    pub const ADMIN: &str = "admin";
}

/// Permission string constants for compile-time safety
pub mod perm {
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE_STATUS: &str = "orders:update-status";
    pub const ORDERS_ACCEPT: &str = "orders:accept";
    pub const ORDERS_CANCEL: &str = "orders:cancel";
    pub const ORDERS_EXPORT: &str = "orders:export";

    pub const NOTIFICATIONS_READ: &str = "notifications:read";
}

lazy_static! {
    /// Role to permission-set mapping
    pub static ref ROLE_PERMISSIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut map = HashMap::new();
        map.insert(
            role::CUSTOMER,
            vec![
                perm::ORDERS_READ,
                perm::ORDERS_CREATE,
                perm::ORDERS_CANCEL,
                perm::NOTIFICATIONS_READ,
            ],
        );
        map.insert(
            role::SUPPLIER,
            vec![
                perm::ORDERS_READ,
                perm::ORDERS_UPDATE_STATUS,
                perm::ORDERS_CANCEL,
            ],
        );
        map.insert(
            role::COURIER,
            vec![
                perm::ORDERS_READ,
                perm::ORDERS_ACCEPT,
                perm::ORDERS_UPDATE_STATUS,
                perm::ORDERS_CANCEL,
            ],
        );
        map.insert(
            role::ADMIN,
            vec![
                perm::ORDERS_READ,
                perm::ORDERS_CREATE,
                perm::ORDERS_UPDATE_STATUS,
                perm::ORDERS_ACCEPT,
                perm::ORDERS_CANCEL,
                perm::ORDERS_EXPORT,
                perm::NOTIFICATIONS_READ,
            ],
        );
        map
    };
}

/// Permission set for a role name; unknown roles carry no permissions
pub fn permissions_for_role(role: &str) -> Vec<String> {
    ROLE_PERMISSIONS
        .get(role)
        .map(|perms| perms.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}
