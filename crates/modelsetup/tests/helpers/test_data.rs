//! Entity configs and models shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;

use modelsetup::SetupSettings;

/// `account`: created with PUT and looked up at `/accounts/{name}`.
pub fn account_config() -> Value {
    json!({
        "name": "account",
        "createUri": "/accounts/{name}",
        "createMethod": "PUT",
        "updateUri": "/accounts/{name}",
        "updateMethod": "PUT"
    })
}

/// `Account` -> `Device` -> `Port`, each child pointing at its parent's uuid.
pub fn account_tree_config() -> Value {
    json!({
        "name": "Account",
        "className": "org.example.model.Account",
        "createUri": "/accounts/{name}",
        "updateUri": "/accounts/{name}",
        "children": {
            "Device": {
                "name": "Device",
                "createUri": "/accounts/{Account.name}/devices/{name}",
                "updateUri": "/accounts/{Account.name}/devices/{name}",
                "parentField": {"name": "account", "reference": {"entity": "Account"}},
                "children": {
                    "Port": {
                        "name": "Port",
                        "createUri": "/devices/{Device.uuid}/ports/{name}",
                        "updateUri": "/devices/{Device.uuid}/ports/{name}",
                        "parentField": {"name": "device"}
                    }
                }
            }
        }
    })
}

/// An account with `count` devices and no ports.
pub fn account_with_devices(count: usize) -> String {
    let devices: Vec<Value> = (1..=count).map(|i| json!({"name": format!("d{i}")})).collect();
    json!([{"name": "acme", "children": {"Device": devices}}]).to_string()
}

/// Settings with a small pool and short timeout.
pub fn test_settings(max_concurrency: usize) -> SetupSettings {
    SetupSettings {
        max_concurrency,
        child_timeout: Duration::from_secs(10),
        run_label: "test-run".to_string(),
        ..SetupSettings::default()
    }
}
